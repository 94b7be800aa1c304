use crate::browser::Locator;
use crate::error::E2eResult;

use super::{click_if_visible, PageContext, CLICK_IF_VISIBLE_TIMEOUT};

/// `/product_details/<id>`
pub struct ProductDetailsPage {
    pub(super) ctx: PageContext,
    pub add_to_cart_button: Locator,
    /// Button of the "added" modal, which does not always open
    pub continue_shopping_button: Locator,
}

impl ProductDetailsPage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        Self {
            add_to_cart_button: Locator::role_matching("button", "add to cart"),
            continue_shopping_button: Locator::role_matching("button", "continue shopping"),
            ctx,
        }
    }

    pub async fn goto_by_id(&self, product_id: u32) -> E2eResult<()> {
        let url = self.ctx.url(&format!("/product_details/{product_id}"))?;
        self.ctx.page().goto(&url).await?;
        self.ctx.settle().await
    }

    pub async fn expect_product_name_visible(&self, name: &str) -> E2eResult<()> {
        self.ctx.expect_visible(&Locator::text_exact(name)).await
    }

    pub async fn add_to_cart_and_continue_shopping(&self) -> E2eResult<()> {
        let page = self.ctx.page();
        page.click(&self.add_to_cart_button).await?;
        click_if_visible(page, &self.continue_shopping_button, CLICK_IF_VISIBLE_TIMEOUT).await;
        Ok(())
    }
}
