//! Browser collaborator
//!
//! Page objects and the consent resolver only see the [`Page`] trait.
//! [`crate::playwright::PlaywrightPage`] drives a real browser;
//! [`crate::testing::ScriptedPage`] stands in for it in tests.

pub mod locator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::BrowserResult;

pub use locator::{Locator, TextMatch};

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// One browser page inside its own browser context
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    async fn click(&self, locator: &Locator) -> BrowserResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> BrowserResult<()>;

    /// Select a `<select>` option by value or label
    async fn select_option(&self, locator: &Locator, value: &str) -> BrowserResult<()>;

    async fn check(&self, locator: &Locator) -> BrowserResult<()>;

    /// Instant visibility check, no waiting
    async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool>;

    /// Wait until `locator` reaches `state`, failing with
    /// [`crate::error::BrowserError::Timeout`] after `timeout`
    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        timeout: Duration,
    ) -> BrowserResult<()>;

    /// Number of matching elements
    async fn count(&self, locator: &Locator) -> BrowserResult<usize>;

    async fn url(&self) -> BrowserResult<String>;

    async fn title(&self) -> BrowserResult<String>;

    /// Persist cookies and local storage of the context as JSON
    async fn storage_state(&self, path: &Path) -> BrowserResult<()>;

    /// Clear cookies and granted permissions of the context
    async fn clear_cookies(&self) -> BrowserResult<()>;

    /// Close the page and its context
    async fn close(&self) -> BrowserResult<()>;
}

/// Page handle shared by every page object of one test
pub type SharedPage = Arc<dyn Page>;
