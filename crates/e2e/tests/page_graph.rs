//! Page-object graph wiring

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use storefront_common::{SiteConfig, TestConfig};
use storefront_e2e::testing::CountingConsent;
use storefront_e2e::{
    BrowserResult, Locator, Page, PageObject, PageObjectGraph, SharedConsent, SharedPage,
    WaitState,
};

/// Page that fails the test on any browser call
struct UntouchablePage;

#[async_trait]
impl Page for UntouchablePage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        panic!("unexpected goto({url})")
    }
    async fn click(&self, locator: &Locator) -> BrowserResult<()> {
        panic!("unexpected click({locator})")
    }
    async fn fill(&self, locator: &Locator, _value: &str) -> BrowserResult<()> {
        panic!("unexpected fill({locator})")
    }
    async fn select_option(&self, locator: &Locator, _value: &str) -> BrowserResult<()> {
        panic!("unexpected select_option({locator})")
    }
    async fn check(&self, locator: &Locator) -> BrowserResult<()> {
        panic!("unexpected check({locator})")
    }
    async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool> {
        panic!("unexpected is_visible({locator})")
    }
    async fn wait_for(&self, locator: &Locator, _: WaitState, _: Duration) -> BrowserResult<()> {
        panic!("unexpected wait_for({locator})")
    }
    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        panic!("unexpected count({locator})")
    }
    async fn url(&self) -> BrowserResult<String> {
        panic!("unexpected url()")
    }
    async fn title(&self) -> BrowserResult<String> {
        panic!("unexpected title()")
    }
    async fn storage_state(&self, _path: &Path) -> BrowserResult<()> {
        panic!("unexpected storage_state()")
    }
    async fn clear_cookies(&self) -> BrowserResult<()> {
        panic!("unexpected clear_cookies()")
    }
    async fn close(&self) -> BrowserResult<()> {
        panic!("unexpected close()")
    }
}

fn site() -> SiteConfig {
    SiteConfig {
        app_url: Some("https://ae.test".to_string()),
        ..Default::default()
    }
}

fn page() -> SharedPage {
    Arc::new(UntouchablePage)
}

fn all_share(graph: &PageObjectGraph, consent: &SharedConsent) -> bool {
    let objects: [&dyn PageObject; 6] = [
        &graph.home,
        &graph.auth,
        &graph.products,
        &graph.product_details,
        &graph.cart,
        &graph.checkout,
    ];
    objects.iter().all(|o| Arc::ptr_eq(o.consent(), consent))
}

#[test]
fn build_shares_one_capability_across_the_graph() {
    let graph = PageObjectGraph::build(page(), &site(), None);
    assert!(all_share(&graph, graph.consent()));
}

#[test]
fn separate_graphs_get_separate_capabilities() {
    let a = PageObjectGraph::build(page(), &site(), None);
    let b = PageObjectGraph::build(page(), &site(), None);
    assert!(!Arc::ptr_eq(a.consent(), b.consent()));
}

#[test]
fn override_is_used_everywhere() {
    let counting: SharedConsent = Arc::new(CountingConsent::default());
    let graph = PageObjectGraph::build(page(), &site(), Some(counting.clone()));

    assert!(Arc::ptr_eq(graph.consent(), &counting));
    assert!(all_share(&graph, &counting));
}

#[test]
fn every_object_holds_the_same_page() {
    let page = page();
    let graph = PageObjectGraph::build(page.clone(), &site(), None);
    assert!(Arc::ptr_eq(graph.cart.page(), &page));
    assert!(Arc::ptr_eq(graph.home.page(), &page));
}

#[tokio::test]
async fn disabled_consent_builds_a_noop_capability() {
    let mut config = TestConfig::default();
    config.site = site();
    config.consent.enabled = false;

    let graph = PageObjectGraph::from_config(page(), &config, None);
    graph.consent().accept_if_visible().await.unwrap();
    assert!(all_share(&graph, graph.consent()));
}
