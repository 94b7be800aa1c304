//! Signup / login page

use tracing::info;

use storefront_common::AeUser;

use crate::browser::Locator;
use crate::error::E2eResult;

use super::{NavBar, PageContext};

/// `/login`, with the two-screen signup flow.
///
/// Form fields are located by `data-qa` test ids, which is why the
/// browser is launched with that test-id attribute.
pub struct AuthPage {
    pub(super) ctx: PageContext,
    pub nav: NavBar,

    pub signup_name: Locator,
    pub signup_email: Locator,
    pub signup_button: Locator,

    pub account_information_heading: Locator,
    pub title_mr: Locator,
    pub password: Locator,
    pub days: Locator,
    pub months: Locator,
    pub years: Locator,
    pub first_name: Locator,
    pub last_name: Locator,
    pub company: Locator,
    pub address1: Locator,
    pub address2: Locator,
    pub country: Locator,
    pub state: Locator,
    pub city: Locator,
    pub zipcode: Locator,
    pub mobile_number: Locator,
    pub create_account_button: Locator,

    pub account_created_heading: Locator,
    pub continue_button: Locator,
}

impl AuthPage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        Self {
            nav: NavBar::new(ctx.clone()),
            signup_name: Locator::test_id("signup-name"),
            signup_email: Locator::test_id("signup-email"),
            signup_button: Locator::test_id("signup-button"),
            account_information_heading: Locator::role_matching(
                "heading",
                "enter account information",
            ),
            title_mr: Locator::role_matching("radio", r"^Mr\.$"),
            password: Locator::test_id("password"),
            days: Locator::test_id("days"),
            months: Locator::test_id("months"),
            years: Locator::test_id("years"),
            first_name: Locator::test_id("first_name"),
            last_name: Locator::test_id("last_name"),
            company: Locator::test_id("company"),
            address1: Locator::test_id("address"),
            address2: Locator::test_id("address2"),
            country: Locator::test_id("country"),
            state: Locator::test_id("state"),
            city: Locator::test_id("city"),
            zipcode: Locator::test_id("zipcode"),
            mobile_number: Locator::test_id("mobile_number"),
            create_account_button: Locator::test_id("create-account"),
            account_created_heading: Locator::role_matching("heading", "account created!"),
            continue_button: Locator::test_id("continue-button"),
            ctx,
        }
    }

    pub async fn open(&self) -> E2eResult<()> {
        let url = self.ctx.url("/login")?;
        self.ctx.page().goto(&url).await?;
        self.ctx.settle().await?;
        self.ctx.expect_url("/login").await
    }

    /// Create `user` and end up logged in
    pub async fn signup(&self, user: &AeUser) -> E2eResult<()> {
        let page = self.ctx.page();

        page.fill(&self.signup_name, &user.name).await?;
        page.fill(&self.signup_email, &user.email).await?;
        page.click(&self.signup_button).await?;
        self.ctx.expect_visible(&self.account_information_heading).await?;

        page.check(&self.title_mr).await?;
        page.fill(&self.password, &user.password).await?;
        page.select_option(&self.days, "1").await?;
        page.select_option(&self.months, "1").await?;
        page.select_option(&self.years, "1990").await?;

        page.fill(&self.first_name, &user.first_name).await?;
        page.fill(&self.last_name, &user.last_name).await?;
        page.fill(&self.company, &user.company).await?;
        page.fill(&self.address1, &user.address1).await?;
        page.fill(&self.address2, &user.address2).await?;
        page.select_option(&self.country, user.country.as_str()).await?;
        page.fill(&self.state, &user.state).await?;
        page.fill(&self.city, &user.city).await?;
        page.fill(&self.zipcode, &user.zip_code).await?;
        page.fill(&self.mobile_number, &user.mobile_number).await?;

        page.click(&self.create_account_button).await?;
        self.ctx.expect_visible(&self.account_created_heading).await?;

        page.click(&self.continue_button).await?;
        self.ctx.settle().await?;
        self.nav.expect_logged_in().await?;

        info!(email = %user.email, "Signed up");
        Ok(())
    }
}
