use crate::browser::Locator;
use crate::error::E2eResult;

use super::PageContext;

/// `/checkout`
pub struct CheckoutPage {
    pub(super) ctx: PageContext,
    pub address_details_heading: Locator,
    pub review_order_heading: Locator,
}

impl CheckoutPage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        Self {
            address_details_heading: Locator::text("address details"),
            review_order_heading: Locator::text("review your order"),
            ctx,
        }
    }

    pub async fn open(&self) -> E2eResult<()> {
        let url = self.ctx.url("/checkout")?;
        self.ctx.page().goto(&url).await?;
        self.ctx.settle().await?;
        self.expect_loaded().await
    }

    pub async fn expect_loaded(&self) -> E2eResult<()> {
        self.ctx.expect_url("/checkout").await?;
        self.ctx.expect_visible(&self.address_details_heading).await?;
        self.ctx.expect_visible(&self.review_order_heading).await
    }

    /// Checkout reached with address and order review on screen
    pub async fn assert_checkout_ready(&self) -> E2eResult<()> {
        self.expect_loaded().await
    }
}
