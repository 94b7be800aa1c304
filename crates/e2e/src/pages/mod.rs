//! AutomationExercise page objects
//!
//! [`PageObjectGraph::build`] wires one page object per page around a
//! single page handle and a single consent capability. Every object of a
//! graph shares that capability; separate graphs never do.

mod auth;
mod cart;
mod checkout;
mod home;
mod navbar;
mod product_details;
mod products;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use storefront_common::{BrowserSettings, SiteConfig, TestConfig};

use crate::browser::{Locator, Page, SharedPage, WaitState};
use crate::consent::{ConsentResolver, NoConsent, PageConsent, SharedConsent};
use crate::error::E2eResult;
use crate::expect;

pub use auth::AuthPage;
pub use cart::CartPage;
pub use checkout::CheckoutPage;
pub use home::HomePage;
pub use navbar::NavBar;
pub use product_details::ProductDetailsPage;
pub use products::ProductsPage;

/// Default wait for optional controls such as modal buttons
pub const CLICK_IF_VISIBLE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Access to the collaborators every page object is built around
pub trait PageObject {
    fn page(&self) -> &SharedPage;

    /// Consent capability shared with the rest of the graph
    fn consent(&self) -> &SharedConsent;
}

/// Collaborators handed to each page object of one graph
#[derive(Clone)]
pub(crate) struct PageContext {
    page: SharedPage,
    site: SiteConfig,
    consent: SharedConsent,
    expect_timeout: Duration,
}

impl PageContext {
    pub(crate) fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub(crate) fn url(&self, path: &str) -> E2eResult<String> {
        Ok(self.site.app_path(path)?)
    }

    pub(crate) fn app_url(&self) -> E2eResult<String> {
        Ok(self.site.app_url()?.to_string())
    }

    /// Clear a consent overlay left by the last navigation
    pub(crate) async fn settle(&self) -> E2eResult<()> {
        self.consent.accept_if_visible().await?;
        Ok(())
    }

    pub(crate) async fn expect_url(&self, pattern: &str) -> E2eResult<()> {
        expect::expect_url(self.page(), pattern, self.expect_timeout).await
    }

    pub(crate) async fn expect_title(&self, pattern: &str) -> E2eResult<()> {
        expect::expect_title(self.page(), pattern, self.expect_timeout).await
    }

    pub(crate) async fn expect_visible(&self, locator: &Locator) -> E2eResult<()> {
        expect::expect_visible(self.page(), locator, self.expect_timeout).await
    }

    pub(crate) async fn expect_count_at_least(&self, locator: &Locator, min: usize) -> E2eResult<()> {
        expect::expect_count_at_least(self.page(), locator, min, self.expect_timeout).await
    }
}

/// Click `locator` if it becomes visible within `timeout`; otherwise do nothing
pub async fn click_if_visible(page: &dyn Page, locator: &Locator, timeout: Duration) -> bool {
    if page
        .wait_for(locator, WaitState::Visible, timeout)
        .await
        .is_err()
    {
        debug!("Optional control {} not shown, skipping", locator);
        return false;
    }
    match page.click(locator).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Optional control {} not clickable: {}", locator, e);
            false
        }
    }
}

/// The page objects of one test, wired to one page
pub struct PageObjectGraph {
    pub home: HomePage,
    pub auth: AuthPage,
    pub products: ProductsPage,
    pub product_details: ProductDetailsPage,
    pub cart: CartPage,
    pub checkout: CheckoutPage,
    consent: SharedConsent,
}

impl PageObjectGraph {
    /// Wire the graph with default timeouts.
    ///
    /// Without an override every page object gets a [`PageConsent`]
    /// bound to `page`. No browser call is made.
    pub fn build(page: SharedPage, site: &SiteConfig, consent: Option<SharedConsent>) -> Self {
        let consent =
            consent.unwrap_or_else(|| PageConsent::shared(page.clone(), ConsentResolver::default()));
        Self::assemble(
            page,
            site.clone(),
            consent,
            BrowserSettings::default().expect_timeout(),
        )
    }

    /// Wire the graph from run configuration (consent timing, expect timeout)
    pub fn from_config(
        page: SharedPage,
        config: &TestConfig,
        consent: Option<SharedConsent>,
    ) -> Self {
        let consent = consent.unwrap_or_else(|| {
            if config.consent.enabled {
                PageConsent::shared(page.clone(), ConsentResolver::new(&config.consent))
            } else {
                Arc::new(NoConsent)
            }
        });
        Self::assemble(
            page,
            config.site.clone(),
            consent,
            config.browser.expect_timeout(),
        )
    }

    fn assemble(
        page: SharedPage,
        site: SiteConfig,
        consent: SharedConsent,
        expect_timeout: Duration,
    ) -> Self {
        let ctx = PageContext {
            page,
            site,
            consent: consent.clone(),
            expect_timeout,
        };

        Self {
            home: HomePage::new(ctx.clone()),
            auth: AuthPage::new(ctx.clone()),
            products: ProductsPage::new(ctx.clone()),
            product_details: ProductDetailsPage::new(ctx.clone()),
            cart: CartPage::new(ctx.clone()),
            checkout: CheckoutPage::new(ctx),
            consent,
        }
    }

    pub fn consent(&self) -> &SharedConsent {
        &self.consent
    }
}

macro_rules! impl_page_object {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PageObject for $ty {
                fn page(&self) -> &SharedPage {
                    &self.ctx.page
                }

                fn consent(&self) -> &SharedConsent {
                    &self.ctx.consent
                }
            }
        )+
    };
}

impl_page_object!(
    HomePage,
    AuthPage,
    ProductsPage,
    ProductDetailsPage,
    CartPage,
    CheckoutPage,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Node, ScriptedPage};

    #[tokio::test(start_paused = true)]
    async fn test_click_if_visible_skips_missing_control() {
        let page = ScriptedPage::new("https://site.test/", "Site");
        let started = tokio::time::Instant::now();
        let clicked = click_if_visible(
            &page,
            &Locator::role_matching("button", "continue shopping"),
            CLICK_IF_VISIBLE_TIMEOUT,
        )
        .await;

        assert!(!clicked);
        assert!(started.elapsed() <= CLICK_IF_VISIBLE_TIMEOUT + Duration::from_millis(50));
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_if_visible_clicks_shown_control() {
        let page = ScriptedPage::new("https://site.test/", "Site");
        page.add(Node::role("button", "Continue Shopping"));

        let button = Locator::role_matching("button", "continue shopping");
        assert!(click_if_visible(&page, &button, CLICK_IF_VISIBLE_TIMEOUT).await);
        assert_eq!(page.clicks(), vec![button.to_string()]);
    }
}
