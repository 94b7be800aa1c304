//! AutomationExercise browser scenarios

use futures::future::BoxFuture;

use storefront_common::AeUser;

use crate::error::E2eResult;
use crate::expect::{expect_title, expect_url, expect_visible};
use crate::fixtures::TestContext;
use crate::runner::{Project, Scenario};

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "should load home page",
            tags: &["@smoke", "@functional"],
            project: Project::Chromium,
            run: load_home_page,
        },
        Scenario {
            name: "should search products and show results",
            tags: &["@sanity", "@functional"],
            project: Project::Chromium,
            run: search_products,
        },
        Scenario {
            name: "should add a product to cart",
            tags: &["@smoke", "@e2e"],
            project: Project::Chromium,
            run: add_product_to_cart,
        },
        Scenario {
            name: "should signup, add product to cart, and reach checkout",
            tags: &["@e2e", "@smoke"],
            project: Project::Chromium,
            run: signup_to_checkout,
        },
    ]
}

fn load_home_page(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let ae = ctx.ae().await?;
        let page = ctx.page().await?;
        let timeout = ctx.config().browser.expect_timeout();

        ctx.step("GIVEN the user opens AutomationExercise", ae.home.goto())
            .await?;
        ctx.step(
            "THEN the home page title should be correct",
            expect_title(page.as_ref(), "automation exercise", timeout),
        )
        .await?;
        ctx.step(
            "AND key home content should be visible",
            expect_visible(page.as_ref(), &ae.home.nav.home_link, timeout),
        )
        .await
    })
}

fn search_products(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let ae = ctx.ae().await?;

        ctx.step("GIVEN user opens home page", ae.home.goto()).await?;
        ctx.step("WHEN user navigates to Products", ae.home.go_to_products())
            .await?;
        ctx.step("AND user searches for \"Dress\"", ae.products.search("Dress"))
            .await?;
        ctx.step(
            "THEN searched products section is visible",
            ae.products.expect_has_result("dress"),
        )
        .await
    })
}

fn add_product_to_cart(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let ae = ctx.ae().await?;

        ctx.step("GIVEN user is on Products page", ae.products.open())
            .await?;
        ctx.step("WHEN user opens a product and adds it to cart", async {
            ae.product_details.goto_by_id(1).await?;
            ae.product_details.expect_product_name_visible("Blue Top").await?;
            ae.product_details.add_to_cart_and_continue_shopping().await
        })
        .await?;
        ctx.step("THEN cart contains the product", async {
            ae.cart.open().await?;
            ae.cart.expect_product_visible("Blue Top").await
        })
        .await
    })
}

fn signup_to_checkout(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let ae = ctx.ae().await?;
        let page = ctx.page().await?;
        let user = AeUser::generate();

        ctx.step("GIVEN a signed-out browser", ctx.reset_storage_state())
            .await?;
        ctx.step("AND a new user signs up and is logged in", async {
            ae.auth.open().await?;
            ae.auth.signup(&user).await
        })
        .await?;
        ctx.step("WHEN user adds a product to cart", async {
            ae.product_details.goto_by_id(1).await?;
            ae.product_details.expect_product_name_visible("Blue Top").await?;
            ae.product_details.add_to_cart_and_continue_shopping().await
        })
        .await?;
        ctx.step("AND user proceeds to checkout", async {
            ae.cart.open().await?;
            ae.cart.expect_product_visible("Blue Top").await?;
            ae.cart.proceed().await
        })
        .await?;
        ctx.step("THEN checkout page should be visible", async {
            ae.checkout.assert_checkout_ready().await?;
            expect_url(
                page.as_ref(),
                "/checkout",
                ctx.config().browser.expect_timeout(),
            )
            .await
        })
        .await
    })
}
