//! Runner behaviour: project ordering, retries, timeouts and results

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use storefront_common::TestConfig;
use storefront_e2e::runner::{TestStatus, TestSuiteResult};
use storefront_e2e::testing::{ScriptedPage, ScriptedPageFactory};
use storefront_e2e::{E2eError, E2eResult, Project, RunFilter, Scenario, TestContext, TestRunner};

fn factory() -> Arc<ScriptedPageFactory> {
    Arc::new(ScriptedPageFactory::new(|| {
        ScriptedPage::new("https://ae.test/", "Automation Exercise").shared()
    }))
}

fn scenario(
    name: &'static str,
    project: Project,
    run: for<'a> fn(&'a TestContext) -> BoxFuture<'a, E2eResult<()>>,
) -> Scenario {
    Scenario {
        name,
        tags: &["@smoke"],
        project,
        run,
    }
}

fn pass(_ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async { Ok(()) })
}

fn fail(_ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async { Err(E2eError::AssertionFailed("boom".to_string())) })
}

fn open_page(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        ctx.page().await?;
        Ok(())
    })
}

/// Writes the storage state the way the real setup project does
fn save_state(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let page = ctx.page().await?;
        page.storage_state(&ctx.config().run.storage_state).await?;
        Ok(())
    })
}

static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

fn flaky(_ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async {
        if FLAKY_CALLS.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(E2eError::AssertionFailed("not yet".to_string()));
        }
        Ok(())
    })
}

fn hangs(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        ctx.page().await?;
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(())
    })
}

fn with_steps(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        ctx.step("GIVEN a passing step", async { Ok(()) }).await?;
        ctx.step("THEN a failing step", async {
            Err::<(), _>(E2eError::AssertionFailed("expected 1 got 2".to_string()))
        })
        .await
    })
}

fn config(dir: &std::path::Path) -> TestConfig {
    let mut config = TestConfig::default();
    config.run.output_dir = dir.join("results");
    config.run.storage_state = dir.join("auth").join("state.json");
    config.run.workers = Some(2);
    config
}

fn status_of(suite: &TestSuiteResult, name: &str) -> TestStatus {
    suite
        .results
        .iter()
        .find(|r| r.name == name)
        .map(|r| r.status)
        .unwrap()
}

#[tokio::test]
async fn retries_until_pass_and_reports_flaky() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.run.retries = 2;

    let runner = TestRunner::new(
        config,
        factory(),
        vec![scenario("flaky", Project::Api, flaky)],
    )
    .unwrap();
    let result = runner.run_test("flaky").await.unwrap();

    assert!(result.success());
    assert!(result.flaky());
    assert_eq!(result.attempts, 3);
}

#[tokio::test]
async fn failure_without_retries_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(dir.path()),
        factory(),
        vec![scenario("fails", Project::Api, fail)],
    )
    .unwrap();

    let suite = runner.run_all().await;
    assert_eq!(suite.failed, 1);
    assert!(!suite.success());
    assert_eq!(suite.results[0].attempts, 1);
    assert!(suite.results[0].error.as_deref().unwrap().contains("boom"));
}

#[tokio::test(start_paused = true)]
async fn whole_test_timeout_closes_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.run.test_timeout_ms = 1_000;
    let factory = factory();

    let runner = TestRunner::new(
        config,
        factory.clone(),
        vec![scenario("hangs", Project::Api, hangs)],
    )
    .unwrap();
    let result = runner.run_test("hangs").await.unwrap();

    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some(E2eError::TestTimeout(1_000).to_string().as_str())
    );
    let opened = factory.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].0.is_closed());
}

#[tokio::test]
async fn setup_runs_first_and_seeds_chromium_pages() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let state = config.run.storage_state.clone();
    let factory = factory();

    // Registered out of order on purpose
    let runner = TestRunner::new(
        config,
        factory.clone(),
        vec![
            scenario("ui", Project::Chromium, open_page),
            scenario("api", Project::Api, pass),
            scenario("setup", Project::Setup, save_state),
        ],
    )
    .unwrap();
    let suite = runner.run_all().await;

    assert!(suite.success());
    assert_eq!(suite.results[0].name, "setup");
    assert!(state.exists());

    let opened = factory.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].1, None);
    assert_eq!(opened[1].1.as_deref(), Some(state.as_path()));
}

#[tokio::test]
async fn chromium_selection_pulls_in_setup() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(dir.path()),
        factory(),
        vec![
            scenario("setup", Project::Setup, save_state),
            scenario("ui", Project::Chromium, open_page),
            scenario("api", Project::Api, pass),
        ],
    )
    .unwrap();

    let suite = runner
        .run_filtered(&RunFilter {
            project: Some(Project::Chromium),
            ..Default::default()
        })
        .await;
    let names: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["setup", "ui"]);
}

#[tokio::test]
async fn browser_test_by_name_runs_setup_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let state = config.run.storage_state.clone();
    let factory = factory();

    let runner = TestRunner::new(
        config,
        factory.clone(),
        vec![
            scenario("setup", Project::Setup, save_state),
            scenario("ui", Project::Chromium, open_page),
        ],
    )
    .unwrap();
    let result = runner.run_test("ui").await.unwrap();

    assert_eq!(result.name, "ui");
    assert!(result.success());
    assert!(state.exists());

    let opened = factory.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[1].1.as_deref(), Some(state.as_path()));
}

#[tokio::test]
async fn browser_test_by_name_is_skipped_when_setup_fails() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(dir.path()),
        factory(),
        vec![
            scenario("setup", Project::Setup, fail),
            scenario("ui", Project::Chromium, open_page),
        ],
    )
    .unwrap();

    let result = runner.run_test("ui").await.unwrap();
    assert_eq!(result.status, TestStatus::Skipped);
}

#[tokio::test]
async fn api_test_by_name_runs_alone() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory();
    let runner = TestRunner::new(
        config(dir.path()),
        factory.clone(),
        vec![
            scenario("setup", Project::Setup, save_state),
            scenario("api", Project::Api, pass),
        ],
    )
    .unwrap();

    let result = runner.run_test("api").await.unwrap();
    assert!(result.success());
    assert!(factory.opened().is_empty());
}

#[tokio::test]
async fn failed_setup_skips_browser_tests_only() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory();
    let runner = TestRunner::new(
        config(dir.path()),
        factory.clone(),
        vec![
            scenario("setup", Project::Setup, fail),
            scenario("ui", Project::Chromium, open_page),
            scenario("api", Project::Api, pass),
        ],
    )
    .unwrap();

    let suite = runner.run_all().await;
    assert_eq!(status_of(&suite, "setup"), TestStatus::Failed);
    assert_eq!(status_of(&suite, "ui"), TestStatus::Skipped);
    assert_eq!(status_of(&suite, "api"), TestStatus::Passed);
    assert_eq!(suite.skipped, 1);
    assert!(factory.opened().is_empty());
}

#[tokio::test]
async fn api_scenarios_do_not_get_storage_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    std::fs::create_dir_all(config.run.storage_state.parent().unwrap()).unwrap();
    std::fs::write(&config.run.storage_state, "{}").unwrap();
    let factory = factory();

    let runner = TestRunner::new(
        config,
        factory.clone(),
        vec![scenario("api page", Project::Api, open_page)],
    )
    .unwrap();
    runner.run_all().await;

    assert_eq!(factory.opened()[0].1, None);
}

#[tokio::test]
async fn steps_of_the_last_attempt_are_kept() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(dir.path()),
        factory(),
        vec![scenario("steps", Project::Api, with_steps)],
    )
    .unwrap();

    let result = runner.run_test("steps").await.unwrap();
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps[0].success);
    assert!(!result.steps[1].success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("THEN a failing step"));
}

#[tokio::test]
async fn run_test_unknown_name() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(config(dir.path()), factory(), vec![]).unwrap();

    let err = runner.run_test("missing").await.unwrap_err();
    assert!(matches!(err, E2eError::TestNotFound(name) if name == "missing"));
}

#[tokio::test]
async fn results_are_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(dir.path()),
        factory(),
        vec![
            scenario("passes", Project::Api, pass),
            scenario("fails", Project::Api, fail),
        ],
    )
    .unwrap();

    let suite = runner.run_tagged("smoke").await;
    let path = runner.write_results(&suite).unwrap();
    assert_eq!(path, dir.path().join("results").join("test-results.json"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["total"], 2);
    assert_eq!(written["passed"], 1);
    assert_eq!(written["results"][0]["name"], "passes");
    assert_eq!(written["results"][0]["project"], "api");
    assert_eq!(written["results"][1]["status"], "failed");
}
