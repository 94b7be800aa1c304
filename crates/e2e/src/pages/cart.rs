use crate::browser::Locator;
use crate::error::E2eResult;

use super::{NavBar, PageContext};

/// `/view_cart`
pub struct CartPage {
    pub(super) ctx: PageContext,
    pub nav: NavBar,
    /// Rendered as a button, a link or bare text depending on the layout
    pub proceed_to_checkout: Locator,
}

impl CartPage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        Self {
            nav: NavBar::new(ctx.clone()),
            proceed_to_checkout: Locator::role_matching("button", "proceed to checkout")
                .or(Locator::role_matching("link", "proceed to checkout"))
                .or(Locator::text("^proceed to checkout$"))
                .first(),
            ctx,
        }
    }

    /// Open the cart through the header link
    pub async fn open(&self) -> E2eResult<()> {
        self.nav.open_cart().await?;
        self.ctx.settle().await?;
        self.ctx.expect_url("/view_cart").await
    }

    pub async fn expect_product_visible(&self, name: &str) -> E2eResult<()> {
        self.ctx.expect_visible(&Locator::text_exact(name)).await
    }

    pub async fn proceed(&self) -> E2eResult<()> {
        self.ctx.expect_visible(&self.proceed_to_checkout).await?;
        self.ctx.page().click(&self.proceed_to_checkout).await?;
        self.ctx.settle().await?;
        self.ctx.expect_url("/checkout").await
    }
}
