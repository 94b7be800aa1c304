use crate::browser::Locator;
use crate::error::E2eResult;

use super::PageContext;

/// Glyph the icon-only search button carries as its accessible name
const SEARCH_ICON_GLYPH: &str = "\u{f002}";

/// `/products` listing and search
pub struct ProductsPage {
    pub(super) ctx: PageContext,
    pub search_input: Locator,
    pub search_button: Locator,
    pub search_icon_button: Locator,
    pub searched_products_heading: Locator,
}

impl ProductsPage {
    pub(crate) fn new(ctx: PageContext) -> Self {
        Self {
            search_input: Locator::placeholder("search product"),
            search_button: Locator::role_matching("button", "^search$"),
            search_icon_button: Locator::role_matching("button", SEARCH_ICON_GLYPH),
            searched_products_heading: Locator::role_matching("heading", "searched products"),
            ctx,
        }
    }

    pub async fn open(&self) -> E2eResult<()> {
        let url = self.ctx.url("/products")?;
        self.ctx.page().goto(&url).await?;
        self.ctx.settle().await?;
        self.ctx.expect_url("/products").await
    }

    /// Search for `term` and wait for the results section
    pub async fn search(&self, term: &str) -> E2eResult<()> {
        let page = self.ctx.page();
        page.fill(&self.search_input, term).await?;

        let labelled = page.is_visible(&self.search_button).await.unwrap_or(false);
        if labelled {
            page.click(&self.search_button).await?;
        } else {
            page.click(&self.search_icon_button).await?;
        }

        self.ctx.expect_visible(&self.searched_products_heading).await
    }

    /// At least one product text matches `pattern`
    pub async fn expect_has_result(&self, pattern: &str) -> E2eResult<()> {
        self.ctx.expect_count_at_least(&Locator::text(pattern), 1).await
    }
}
