//! Test runner: selects scenarios, runs them with retries and timeouts,
//! and writes the suite results

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use storefront_common::TestConfig;

use crate::api::ApiClient;
use crate::error::{E2eError, E2eResult};
use crate::fixtures::{PageFactory, TestContext};

/// Body of a scenario
pub type ScenarioFn = for<'a> fn(&'a TestContext) -> BoxFuture<'a, E2eResult<()>>;

/// Group a scenario runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Project {
    /// Produces the signed-in storage state; runs before `Chromium`
    Setup,
    /// Browser scenarios, seeded with the setup storage state
    Chromium,
    /// HTTP-only scenarios
    Api,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Project::Setup => f.write_str("setup"),
            Project::Chromium => f.write_str("chromium"),
            Project::Api => f.write_str("api"),
        }
    }
}

impl FromStr for Project {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "setup" => Ok(Project::Setup),
            "chromium" => Ok(Project::Chromium),
            "api" => Ok(Project::Api),
            other => Err(E2eError::TestNotFound(format!("project '{other}'"))),
        }
    }
}

/// A named test
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    /// Tags such as `@smoke`
    pub tags: &'static [&'static str],
    pub project: Project,
    pub run: ScenarioFn,
}

impl Scenario {
    /// Whether the scenario carries `tag` (with or without the leading `@`)
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim_start_matches('@');
        self.tags
            .iter()
            .any(|t| t.trim_start_matches('@').eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("project", &self.project)
            .finish()
    }
}

/// Scenario selection
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub project: Option<Project>,
}

impl RunFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.tag.as_deref().map_or(true, |t| scenario.has_tag(t))
            && self.name.as_deref().map_or(true, |n| scenario.name == n)
            && self.project.map_or(true, |p| scenario.project == p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Not run because a setup scenario failed
    Skipped,
}

/// Outcome of one recorded step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub project: Project,
    pub tags: Vec<String>,
    pub status: TestStatus,
    /// Attempts made, retries included
    pub attempts: u32,
    pub duration_ms: u64,
    /// Steps of the last attempt
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TestResult {
    pub fn success(&self) -> bool {
        self.status == TestStatus::Passed
    }

    /// Passed, but only after a retry
    pub fn flaky(&self) -> bool {
        self.success() && self.attempts > 1
    }

    fn skipped(scenario: &Scenario, reason: &str) -> Self {
        Self {
            name: scenario.name.to_string(),
            project: scenario.project,
            tags: scenario.tags.iter().map(|t| t.to_string()).collect(),
            status: TestStatus::Skipped,
            attempts: 0,
            duration_ms: 0,
            steps: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub flaky: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    fn collect(
        started_at: chrono::DateTime<chrono::Utc>,
        duration_ms: u64,
        results: Vec<TestResult>,
    ) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            started_at,
            total: results.len(),
            passed: count(TestStatus::Passed),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
            flaky: results.iter().filter(|r| r.flaky()).count(),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: Arc<TestConfig>,
    factory: Arc<dyn PageFactory>,
    api: ApiClient,
    scenarios: Vec<Scenario>,
}

impl TestRunner {
    pub fn new(
        config: TestConfig,
        factory: Arc<dyn PageFactory>,
        scenarios: Vec<Scenario>,
    ) -> E2eResult<Self> {
        let api = ApiClient::new(config.browser.navigation_timeout())?;
        Ok(Self {
            config: Arc::new(config),
            factory,
            api,
            scenarios,
        })
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Run every registered scenario
    pub async fn run_all(&self) -> TestSuiteResult {
        self.run_filtered(&RunFilter::default()).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> TestSuiteResult {
        self.run_filtered(&RunFilter {
            tag: Some(tag.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Run a specific test by name. A browser test still gets the setup
    /// project run ahead of it.
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let scenario = self
            .scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::TestNotFound(name.to_string()))?;

        let suite = self.run_scenarios(&[scenario]).await;
        suite
            .results
            .into_iter()
            .rev()
            .find(|r| r.name == name)
            .ok_or_else(|| E2eError::TestNotFound(name.to_string()))
    }

    pub async fn run_filtered(&self, filter: &RunFilter) -> TestSuiteResult {
        let selected: Vec<&Scenario> = self.scenarios.iter().filter(|s| filter.matches(s)).collect();
        self.run_scenarios(&selected).await
    }

    /// Run `selected`. Setup scenarios run first, one at a time; browser
    /// scenarios pull in the setup project even when not selected. The
    /// rest run concurrently up to the worker count.
    pub async fn run_scenarios(&self, selected: &[&Scenario]) -> TestSuiteResult {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        let needs_setup = selected.iter().any(|s| s.project == Project::Chromium);
        let setup: Vec<&Scenario> = self
            .scenarios
            .iter()
            .filter(|s| {
                s.project == Project::Setup
                    && (needs_setup || selected.iter().any(|sel| sel.name == s.name))
            })
            .collect();
        let rest: Vec<&Scenario> = selected
            .iter()
            .copied()
            .filter(|s| s.project != Project::Setup)
            .collect();

        info!(
            "Running {} test(s) with {} worker(s)...",
            setup.len() + rest.len(),
            self.config.run.worker_count()
        );

        let mut results = Vec::with_capacity(setup.len() + rest.len());
        let mut setup_failed = false;
        for scenario in &setup {
            let result = self.run_scenario(scenario).await;
            setup_failed |= !result.success();
            results.push(result);
        }

        let workers = self.config.run.worker_count().max(1);
        let mut ordered: Vec<(usize, TestResult)> = stream::iter(rest.into_iter().enumerate())
            .map(|(index, scenario)| async move {
                if setup_failed && scenario.project == Project::Chromium {
                    warn!("Skipping {}: setup failed", scenario.name);
                    return (index, TestResult::skipped(scenario, "setup project failed"));
                }
                (index, self.run_scenario(scenario).await)
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        ordered.sort_by_key(|(index, _)| *index);
        results.extend(ordered.into_iter().map(|(_, r)| r));

        let suite = TestSuiteResult::collect(started_at, start.elapsed().as_millis() as u64, results);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped, {} flaky ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.flaky, suite.duration_ms
        );
        suite
    }

    /// Run one scenario, retrying failed attempts
    pub async fn run_scenario(&self, scenario: &Scenario) -> TestResult {
        let start = Instant::now();
        let max_attempts = self.config.run.retries + 1;

        let mut attempts = 0;
        let (outcome, steps) = loop {
            attempts += 1;
            let (outcome, steps) = self.attempt(scenario).await;
            if let Err(e) = &outcome {
                if attempts < max_attempts {
                    warn!(
                        "Retrying {} (attempt {}/{}): {}",
                        scenario.name, attempts, max_attempts, e
                    );
                    continue;
                }
            }
            break (outcome, steps);
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) if attempts > 1 => warn!(
                "✓ {} ({} ms, flaky: {} attempts)",
                scenario.name, duration_ms, attempts
            ),
            Ok(()) => info!("✓ {} ({} ms)", scenario.name, duration_ms),
            Err(e) => error!("✗ {} - {}", scenario.name, e),
        }

        TestResult {
            name: scenario.name.to_string(),
            project: scenario.project,
            tags: scenario.tags.iter().map(|t| t.to_string()).collect(),
            status: if outcome.is_ok() {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            },
            attempts,
            duration_ms,
            steps,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// One attempt in a fresh context, bounded by the test timeout
    async fn attempt(&self, scenario: &Scenario) -> (E2eResult<()>, Vec<StepResult>) {
        debug!("Running test: {}", scenario.name);
        let ctx = TestContext::new(
            scenario.name,
            self.config.clone(),
            self.factory.clone(),
            self.api.clone(),
            self.storage_state_for(scenario.project),
        );

        let timeout = self.config.run.test_timeout();
        let outcome = match tokio::time::timeout(timeout, (scenario.run)(&ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(E2eError::TestTimeout(timeout.as_millis() as u64)),
        };

        ctx.teardown().await;
        (outcome, ctx.steps())
    }

    fn storage_state_for(&self, project: Project) -> Option<PathBuf> {
        let path = &self.config.run.storage_state;
        (project == Project::Chromium && path.exists()).then(|| path.clone())
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        let output_dir = &self.config.run.output_dir;
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
