//! Polling assertions
//!
//! Each assertion re-checks the page until it holds or the expect
//! timeout runs out, then fails with [`E2eError::AssertionFailed`].

use regex::{Regex, RegexBuilder};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::browser::{Locator, Page, WaitState};
use crate::error::{BrowserError, E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn pattern(pattern: &str) -> E2eResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| E2eError::AssertionFailed(format!("invalid pattern /{pattern}/: {e}")))
}

/// Poll `probe` until it passes or the deadline is reached; returns the last result
async fn poll<F, Fut, T>(timeout: Duration, mut probe: F) -> E2eResult<Result<(), T>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = E2eResult<Result<(), T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        let last = probe().await?;
        if last.is_ok() || Instant::now() >= deadline {
            return Ok(last);
        }
        sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}

/// Page URL matches `url_pattern` (case-insensitive regex)
pub async fn expect_url(page: &dyn Page, url_pattern: &str, timeout: Duration) -> E2eResult<()> {
    let re = &pattern(url_pattern)?;
    let outcome = poll(timeout, move || async move {
        let url = page.url().await?;
        Ok(if re.is_match(&url) { Ok(()) } else { Err(url) })
    })
    .await?;

    outcome.map_err(|url| {
        E2eError::AssertionFailed(format!("expected URL to match /{url_pattern}/i, got {url}"))
    })
}

/// Page title matches `title_pattern` (case-insensitive regex)
pub async fn expect_title(
    page: &dyn Page,
    title_pattern: &str,
    timeout: Duration,
) -> E2eResult<()> {
    let re = &pattern(title_pattern)?;
    let outcome = poll(timeout, move || async move {
        let title = page.title().await?;
        Ok(if re.is_match(&title) { Ok(()) } else { Err(title) })
    })
    .await?;

    outcome.map_err(|title| {
        E2eError::AssertionFailed(format!(
            "expected title to match /{title_pattern}/i, got \"{title}\""
        ))
    })
}

async fn expect_state(
    page: &dyn Page,
    locator: &Locator,
    state: WaitState,
    timeout: Duration,
) -> E2eResult<()> {
    match page.wait_for(locator, state, timeout).await {
        Ok(()) => Ok(()),
        Err(e @ (BrowserError::Timeout { .. } | BrowserError::ElementNotFound(_))) => {
            Err(E2eError::AssertionFailed(format!(
                "expected {locator} to be {}: {e}",
                match state {
                    WaitState::Visible => "visible",
                    WaitState::Hidden => "hidden",
                    WaitState::Attached => "attached",
                    WaitState::Detached => "detached",
                }
            )))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn expect_visible(page: &dyn Page, locator: &Locator, timeout: Duration) -> E2eResult<()> {
    expect_state(page, locator, WaitState::Visible, timeout).await
}

pub async fn expect_hidden(page: &dyn Page, locator: &Locator, timeout: Duration) -> E2eResult<()> {
    expect_state(page, locator, WaitState::Hidden, timeout).await
}

/// At least `min` elements match `locator`
pub async fn expect_count_at_least(
    page: &dyn Page,
    locator: &Locator,
    min: usize,
    timeout: Duration,
) -> E2eResult<()> {
    let outcome = poll(timeout, move || async move {
        let count = page.count(locator).await?;
        Ok(if count >= min { Ok(()) } else { Err(count) })
    })
    .await?;

    outcome.map_err(|count| {
        E2eError::AssertionFailed(format!(
            "expected at least {min} match(es) for {locator}, found {count}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Effect, Node, ScriptedPage};

    #[tokio::test(start_paused = true)]
    async fn test_expect_url_waits_for_navigation() {
        let page = ScriptedPage::new("https://site.test/", "Home");
        let link = page.add(Node::role("link", "Products"));
        page.on_click(link, Effect::navigate("https://site.test/products"));

        page.click(&Locator::role("link")).await.unwrap();
        expect_url(&page, r"/products", Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_url_reports_actual() {
        let page = ScriptedPage::new("https://site.test/login", "Login");
        let started = Instant::now();
        let err = expect_url(&page, r"/checkout", Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(err.to_string().contains("https://site.test/login"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_title_is_case_insensitive() {
        let page = ScriptedPage::new("https://site.test/", "Automation Exercise");
        expect_title(&page, "automation exercise", Duration::from_millis(100))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_visible_maps_timeout_to_assertion() {
        let page = ScriptedPage::new("https://site.test/", "Home");
        let err = expect_visible(&page, &Locator::css(".missing"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_count_at_least() {
        let page = ScriptedPage::new("https://site.test/", "Products");
        page.add(Node::text("Blue Dress"));
        page.add(Node::text("Summer dress"));

        let dresses = Locator::text("dress");
        expect_count_at_least(&page, &dresses, 2, Duration::from_millis(100))
            .await
            .unwrap();
        assert!(expect_count_at_least(&page, &dresses, 3, Duration::from_millis(100))
            .await
            .is_err());
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(pattern("(").is_err());
    }
}
