use tracing::debug;

use crate::browser::Locator;
use crate::error::E2eResult;

use super::{NavBar, PageContext};

/// Landing page
pub struct HomePage {
    pub(super) ctx: PageContext,
    pub nav: NavBar,
    pub test_cases_link: Locator,
    pub api_testing_link: Locator,
    pub contact_us_link: Locator,
    // Unique on the page, unlike the carousel content
    pub category_heading: Locator,
    pub features_items_heading: Locator,
    pub subscription_heading: Locator,
}

impl HomePage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        let nav = NavBar::new(ctx.clone());
        Self {
            test_cases_link: nav.header.locate(Locator::role_matching("link", "test cases")),
            api_testing_link: nav.header.locate(Locator::role_matching("link", "api testing")),
            contact_us_link: nav.header.locate(Locator::role_matching("link", "contact us")),
            category_heading: Locator::role_matching("heading", "^category$"),
            features_items_heading: Locator::role_matching("heading", "^features items$"),
            subscription_heading: Locator::role_matching("heading", "^subscription$"),
            nav,
            ctx,
        }
    }

    /// Open the base URL and wait for the landing content
    pub async fn goto(&self) -> E2eResult<()> {
        let url = self.ctx.app_url()?;
        debug!("Opening {}", url);
        self.ctx.page().goto(&url).await?;
        self.ctx.settle().await?;
        self.expect_loaded().await
    }

    pub async fn expect_loaded(&self) -> E2eResult<()> {
        self.ctx.expect_title("automation exercise").await?;
        self.ctx.expect_visible(&self.nav.header).await?;
        self.ctx.expect_visible(&self.category_heading).await?;
        self.ctx.expect_visible(&self.features_items_heading).await?;
        self.ctx.expect_visible(&self.subscription_heading).await
    }

    pub async fn go_home(&self) -> E2eResult<()> {
        self.ctx.page().click(&self.nav.home_link).await?;
        self.ctx.settle().await?;
        self.expect_loaded().await
    }

    pub async fn go_to_products(&self) -> E2eResult<()> {
        self.follow(&self.nav.products_link, "/products").await
    }

    pub async fn go_to_cart(&self) -> E2eResult<()> {
        self.follow(&self.nav.cart_link, "/view_cart").await
    }

    pub async fn go_to_signup_login(&self) -> E2eResult<()> {
        self.follow(&self.nav.signup_login_link, "/login").await
    }

    pub async fn go_to_test_cases(&self) -> E2eResult<()> {
        self.follow(&self.test_cases_link, "/test_cases").await
    }

    pub async fn go_to_api_testing(&self) -> E2eResult<()> {
        self.follow(&self.api_testing_link, "/api_list").await
    }

    pub async fn go_to_contact_us(&self) -> E2eResult<()> {
        self.follow(&self.contact_us_link, "/contact_us").await
    }

    async fn follow(&self, link: &Locator, url_pattern: &str) -> E2eResult<()> {
        self.ctx.page().click(link).await?;
        self.ctx.settle().await?;
        self.ctx.expect_url(url_pattern).await
    }
}
