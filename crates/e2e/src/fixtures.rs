//! Per-test fixtures
//!
//! A [`TestContext`] is created for every attempt of every scenario. The
//! browser page and the page-object graph are opened lazily, so API
//! scenarios never start a browser.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use storefront_common::TestConfig;

use crate::api::ApiClient;
use crate::browser::SharedPage;
use crate::error::{E2eError, E2eResult};
use crate::pages::PageObjectGraph;
use crate::playwright::PlaywrightLauncher;
use crate::runner::StepResult;

/// Opens one isolated browser page per test
#[async_trait]
pub trait PageFactory: Send + Sync {
    /// Open a page, optionally seeded with a saved storage state
    async fn open_page(&self, storage_state: Option<&Path>) -> E2eResult<SharedPage>;
}

#[async_trait]
impl PageFactory for PlaywrightLauncher {
    async fn open_page(&self, storage_state: Option<&Path>) -> E2eResult<SharedPage> {
        let page = self.launch(storage_state).await?;
        Ok(Arc::new(page))
    }
}

/// Everything one scenario attempt can reach
pub struct TestContext {
    name: String,
    config: Arc<TestConfig>,
    factory: Arc<dyn PageFactory>,
    api: ApiClient,
    storage_state: Option<PathBuf>,
    page: OnceCell<SharedPage>,
    graph: OnceCell<PageObjectGraph>,
    steps: Mutex<Vec<StepResult>>,
}

impl TestContext {
    pub fn new(
        name: impl Into<String>,
        config: Arc<TestConfig>,
        factory: Arc<dyn PageFactory>,
        api: ApiClient,
        storage_state: Option<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            factory,
            api,
            storage_state,
            page: OnceCell::new(),
            graph: OnceCell::new(),
            steps: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The test's page, opened on first use
    pub async fn page(&self) -> E2eResult<SharedPage> {
        let page = self
            .page
            .get_or_try_init(|| async {
                debug!(test = %self.name, "Opening browser page");
                self.factory.open_page(self.storage_state.as_deref()).await
            })
            .await?;
        Ok(page.clone())
    }

    /// Page objects of this test, wired on first use
    pub async fn ae(&self) -> E2eResult<&PageObjectGraph> {
        self.graph
            .get_or_try_init(|| async {
                let page = self.page().await?;
                Ok::<_, E2eError>(PageObjectGraph::from_config(page, &self.config, None))
            })
            .await
    }

    /// Run one named step and record its outcome.
    ///
    /// Step names follow the GIVEN / WHEN / AND / THEN convention.
    pub async fn step<T, F>(&self, name: &str, step: F) -> E2eResult<T>
    where
        F: Future<Output = E2eResult<T>>,
    {
        debug!(test = %self.name, "{}", name);
        let started = Instant::now();
        let outcome = step.await;

        self.steps.lock().push(StepResult {
            name: name.to_string(),
            success: outcome.is_ok(),
            duration_ms: started.elapsed().as_millis() as u64,
            error: outcome.as_ref().err().map(ToString::to_string),
        });

        outcome.map_err(|e| E2eError::StepFailed {
            step: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Start from a signed-out browser: drop cookies and granted
    /// permissions of the test's context
    pub async fn reset_storage_state(&self) -> E2eResult<()> {
        let page = self.page().await?;
        debug!(test = %self.name, "Resetting storage state");
        page.clear_cookies().await?;
        Ok(())
    }

    /// Steps recorded so far
    pub fn steps(&self) -> Vec<StepResult> {
        self.steps.lock().clone()
    }

    /// Close the page if one was opened
    pub async fn teardown(&self) {
        if let Some(page) = self.page.get() {
            if let Err(e) = page.close().await {
                warn!(test = %self.name, "Failed to close page: {}", e);
            }
        }
    }
}
