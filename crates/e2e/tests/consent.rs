//! Consent overlay behaviour against a scripted page on tokio's paused clock

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use storefront_common::ConsentSettings;
use storefront_e2e::error::BrowserResult;
use storefront_e2e::testing::{Effect, Node, NodeId, ScriptedPage};
use storefront_e2e::{
    BrowserError, ConsentError, ConsentOutcome, ConsentResolver, Locator, Page, PageConsent,
    SelectorStrategy, WaitState,
};

const PROBE: Duration = Duration::from_millis(1500);
const CONFIRM: Duration = Duration::from_millis(5000);

struct Site {
    page: Arc<ScriptedPage>,
    root: NodeId,
    overlay: NodeId,
    accept: NodeId,
}

fn add_to_cart() -> Locator {
    Locator::role_exact("button", "Add to cart")
}

/// Product page with a control covered by the Funding Choices banner
fn funding_choices_site(label: &str) -> Site {
    let page = ScriptedPage::new("https://ae.test/product_details/1", "Automation Exercise").shared();
    page.add(Node::role("button", "Add to cart"));

    let overlay = page.add(Node::class("fc-dialog-overlay").blocking());
    let root = page.add(Node::class("fc-consent-root").modal());
    page.add(Node::role("button", "Do not consent").inside(root));
    page.add(Node::role("button", "Manage options").inside(root));
    let accept = page.add(Node::role("button", label).inside(root));

    Site {
        page,
        root,
        overlay,
        accept,
    }
}

/// Banner goes away `root_after` after the click, its mask `overlay_after`
fn dismissible(site: &Site, root_after: Duration, overlay_after: Duration) {
    site.page
        .on_click(site.accept, Effect::hide_after(site.root, root_after));
    site.page
        .on_click(site.accept, Effect::hide_after(site.overlay, overlay_after));
}

fn resolver() -> ConsentResolver {
    ConsentResolver::default()
}

async fn dismisses_overlay_and_unblocks_page(label: &str) {
    let site = funding_choices_site(label);
    dismissible(&site, Duration::from_millis(300), Duration::from_millis(700));

    let blocked = site.page.click(&add_to_cart()).await;
    assert!(matches!(blocked, Err(BrowserError::Intercepted { .. })));

    let outcome = resolver().resolve(site.page.as_ref()).await.unwrap();
    assert_eq!(
        outcome,
        ConsentOutcome::Dismissed {
            variant: "funding-choices"
        }
    );

    assert!(!site.page.is_shown(site.root));
    assert!(!site.page.is_shown(site.overlay));
    assert_eq!(site.page.clicks().len(), 1);
    assert!(site.page.clicks()[0].contains("consent"));

    site.page.click(&add_to_cart()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn dismisses_plain_consent_label() {
    dismisses_overlay_and_unblocks_page("Consent").await;
}

#[tokio::test(start_paused = true)]
async fn dismisses_first_person_consent_label() {
    dismisses_overlay_and_unblocks_page("I Consent").await;
}

#[tokio::test(start_paused = true)]
async fn absent_overlay_is_a_bounded_noop() {
    let page = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    page.add(Node::role("button", "Add to cart"));

    let started = Instant::now();
    let outcome = resolver().resolve(&page).await.unwrap();

    assert_eq!(outcome, ConsentOutcome::Absent);
    assert!(started.elapsed() <= PROBE + Duration::from_millis(50));
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn repeated_calls_without_overlay_click_nothing() {
    let page = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    let resolver = resolver();

    for _ in 0..2 {
        let started = Instant::now();
        assert_eq!(resolver.resolve(&page).await.unwrap(), ConsentOutcome::Absent);
        assert!(started.elapsed() <= PROBE + Duration::from_millis(50));
    }
    assert!(page.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_call_after_dismissal_is_absent() {
    let site = funding_choices_site("Consent");
    dismissible(&site, Duration::ZERO, Duration::from_millis(100));
    let resolver = resolver();

    resolver.resolve(site.page.as_ref()).await.unwrap();
    let outcome = resolver.resolve(site.page.as_ref()).await.unwrap();

    assert_eq!(outcome, ConsentOutcome::Absent);
    assert_eq!(site.page.clicks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_overlay_times_out_within_confirm_window() {
    // Clicking does nothing; the banner stays up
    let site = funding_choices_site("Consent");

    let started = Instant::now();
    let err = resolver().resolve(site.page.as_ref()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= CONFIRM);
    assert!(elapsed <= CONFIRM + Duration::from_millis(100));

    let ConsentError::StateTransitionTimeout {
        variant,
        selector,
        strategy,
        timeout_ms,
    } = err;
    assert_eq!(variant, "funding-choices");
    assert!(selector.contains(".fc-consent-root"));
    assert_eq!(strategy, SelectorStrategy::Structural);
    assert_eq!(timeout_ms, 5000);
}

#[tokio::test(start_paused = true)]
async fn lingering_mask_is_reported_by_its_selector() {
    let site = funding_choices_site("Consent");
    dismissible(&site, Duration::from_millis(100), Duration::from_secs(60));

    let started = Instant::now();
    let err = resolver().resolve(site.page.as_ref()).await.unwrap_err();

    // One deadline covers the root and the mask
    assert!(started.elapsed() <= CONFIRM + Duration::from_millis(100));
    let ConsentError::StateTransitionTimeout { selector, .. } = err;
    assert_eq!(selector, "css=.fc-dialog-overlay");
}

#[tokio::test(start_paused = true)]
async fn semantic_dialog_variant() {
    let page = ScriptedPage::new("https://shop.test/", "Shop");
    let dialog = page.add(Node::role("dialog", "We value your privacy").modal());
    let accept = page.add(Node::role("button", "I Consent").inside(dialog));
    page.on_click(accept, Effect::hide(dialog));

    let outcome = resolver().resolve(&page).await.unwrap();
    assert_eq!(
        outcome,
        ConsentOutcome::Dismissed {
            variant: "consent-dialog"
        }
    );
    assert!(!page.is_shown(dialog));
}

#[tokio::test(start_paused = true)]
async fn highest_priority_variant_wins() {
    let site = funding_choices_site("Consent");
    dismissible(&site, Duration::ZERO, Duration::ZERO);
    let dialog = site.page.add(Node::role("dialog", "Cookie settings").modal());
    site.page.add(Node::role("button", "Consent").inside(dialog));

    let outcome = resolver().resolve(site.page.as_ref()).await.unwrap();
    assert_eq!(
        outcome,
        ConsentOutcome::Dismissed {
            variant: "funding-choices"
        }
    );
    assert!(site.page.is_shown(dialog));
}

#[tokio::test(start_paused = true)]
async fn configured_timeouts_are_used() {
    let settings = ConsentSettings {
        probe_timeout_ms: 200,
        confirm_timeout_ms: 800,
        ..Default::default()
    };
    let resolver = ConsentResolver::new(&settings);

    let empty = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    let started = Instant::now();
    resolver.resolve(&empty).await.unwrap();
    assert!(started.elapsed() <= Duration::from_millis(250));

    let site = funding_choices_site("Consent");
    let ConsentError::StateTransitionTimeout { timeout_ms, .. } =
        resolver.resolve(site.page.as_ref()).await.unwrap_err();
    assert_eq!(timeout_ms, 800);
}

#[tokio::test(start_paused = true)]
async fn capability_propagates_timeout() {
    let site = funding_choices_site("Consent");
    let consent = PageConsent::shared(site.page.clone(), resolver());

    let err = consent.accept_if_visible().await.unwrap_err();
    assert!(matches!(err, ConsentError::StateTransitionTimeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn capability_is_quiet_without_overlay() {
    let page = ScriptedPage::new("https://ae.test/", "Automation Exercise").shared();
    let consent = PageConsent::shared(page.clone(), resolver());

    consent.accept_if_visible().await.unwrap();
    assert!(page.clicks().is_empty());
}

/// Page whose driver fails every wait instead of timing out
struct FailingWaits {
    inner: ScriptedPage,
    error: fn() -> BrowserError,
}

#[async_trait]
impl Page for FailingWaits {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.inner.goto(url).await
    }

    async fn click(&self, locator: &Locator) -> BrowserResult<()> {
        self.inner.click(locator).await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.inner.fill(locator, value).await
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.inner.select_option(locator, value).await
    }

    async fn check(&self, locator: &Locator) -> BrowserResult<()> {
        self.inner.check(locator).await
    }

    async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool> {
        self.inner.is_visible(locator).await
    }

    async fn wait_for(&self, _: &Locator, _: WaitState, _: Duration) -> BrowserResult<()> {
        Err((self.error)())
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        self.inner.count(locator).await
    }

    async fn url(&self) -> BrowserResult<String> {
        self.inner.url().await
    }

    async fn title(&self) -> BrowserResult<String> {
        self.inner.title().await
    }

    async fn storage_state(&self, path: &Path) -> BrowserResult<()> {
        self.inner.storage_state(path).await
    }

    async fn clear_cookies(&self) -> BrowserResult<()> {
        self.inner.clear_cookies().await
    }

    async fn close(&self) -> BrowserResult<()> {
        self.inner.close().await
    }
}

fn failing_waits(error: fn() -> BrowserError) -> FailingWaits {
    let inner = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    let root = inner.add(Node::class("fc-consent-root").modal());
    inner.add(Node::role("button", "Consent").inside(root));
    FailingWaits { inner, error }
}

#[tokio::test(start_paused = true)]
async fn driver_error_while_detecting_counts_as_absent() {
    let page = failing_waits(|| BrowserError::Driver("target closed".to_string()));

    let started = Instant::now();
    let outcome = resolver().resolve(&page).await.unwrap();

    assert_eq!(outcome, ConsentOutcome::Absent);
    assert!(started.elapsed() < PROBE);
    assert!(page.inner.clicks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_element_while_detecting_counts_as_absent() {
    let page = failing_waits(|| BrowserError::ElementNotFound(".fc-consent-root".to_string()));

    let outcome = resolver().resolve(&page).await.unwrap();
    assert_eq!(outcome, ConsentOutcome::Absent);
    assert!(page.inner.clicks().is_empty());
}

/// Funding Choices banner whose accept button never rendered
fn banner_without_button(page: &ScriptedPage, root: Node, overlay: Node) {
    page.add(Node::role("button", "Add to cart"));
    page.add(overlay);
    page.add(root);
}

#[tokio::test(start_paused = true)]
async fn failed_accept_click_still_times_out() {
    let page = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    banner_without_button(
        &page,
        Node::class("fc-consent-root").modal(),
        Node::class("fc-dialog-overlay").blocking(),
    );

    let started = Instant::now();
    let err = resolver().resolve(&page).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= CONFIRM);
    assert!(elapsed <= CONFIRM + Duration::from_millis(100));
    assert!(page.clicks().is_empty());
    let ConsentError::StateTransitionTimeout { selector, .. } = err;
    assert!(selector.contains(".fc-consent-root"));
}

#[tokio::test(start_paused = true)]
async fn failed_accept_click_on_a_vanishing_banner_is_dismissed() {
    let page = ScriptedPage::new("https://ae.test/", "Automation Exercise");
    banner_without_button(
        &page,
        Node::class("fc-consent-root")
            .modal()
            .vanishes_after(Duration::from_millis(200)),
        Node::class("fc-dialog-overlay")
            .blocking()
            .vanishes_after(Duration::from_millis(400)),
    );

    let outcome = resolver().resolve(&page).await.unwrap();

    assert_eq!(
        outcome,
        ConsentOutcome::Dismissed {
            variant: "funding-choices"
        }
    );
    assert!(page.clicks().is_empty());
    page.click(&add_to_cart()).await.unwrap();
}
