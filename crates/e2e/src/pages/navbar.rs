//! Header navigation shared by several pages

use crate::browser::Locator;
use crate::error::E2eResult;

use super::PageContext;

/// Site header links, scoped to the banner so footer links never match
#[derive(Clone)]
pub struct NavBar {
    ctx: PageContext,
    pub header: Locator,
    pub home_link: Locator,
    pub products_link: Locator,
    pub cart_link: Locator,
    pub signup_login_link: Locator,
    /// Shown only after login
    pub logout_link: Locator,
    pub logged_in_as: Locator,
}

impl NavBar {
    pub(crate) fn new(ctx: PageContext) -> Self {
        let header = Locator::role("banner");
        Self {
            home_link: header.locate(Locator::role_matching("link", "home")),
            products_link: header.locate(Locator::role_matching("link", "products")),
            cart_link: header.locate(Locator::role_matching("link", "cart")),
            signup_login_link: header.locate(Locator::role_matching("link", r"signup\s*/\s*login")),
            logout_link: header.locate(Locator::role_matching("link", "logout")),
            logged_in_as: header.locate(Locator::text("logged in as")),
            header,
            ctx,
        }
    }

    pub async fn open_cart(&self) -> E2eResult<()> {
        self.ctx.page().click(&self.cart_link).await?;
        Ok(())
    }

    pub async fn expect_logged_in(&self) -> E2eResult<()> {
        self.ctx.expect_visible(&self.logged_in_as).await?;
        self.ctx.expect_visible(&self.logout_link).await
    }
}
