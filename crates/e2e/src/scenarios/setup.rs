//! Signed-in storage state for the browser project

use futures::future::BoxFuture;
use tracing::info;

use storefront_common::AeUser;

use crate::error::E2eResult;
use crate::expect::expect_visible;
use crate::fixtures::TestContext;
use crate::runner::{Project, Scenario};

pub fn scenarios() -> Vec<Scenario> {
    vec![Scenario {
        name: "automationexercise auth setup",
        tags: &["@setup"],
        project: Project::Setup,
        run: auth_setup,
    }]
}

/// Sign up a fresh user and save the browser storage state
fn auth_setup(ctx: &TestContext) -> BoxFuture<'_, E2eResult<()>> {
    Box::pin(async move {
        let ae = ctx.ae().await?;
        let user = AeUser::generate();

        ctx.step("GIVEN the signup form is shown", async {
            ae.auth.open().await?;
            expect_visible(
                ctx.page().await?.as_ref(),
                &ae.auth.signup_button,
                ctx.config().browser.expect_timeout(),
            )
            .await
        })
        .await?;

        ctx.step("WHEN a new user signs up", ae.auth.signup(&user))
            .await?;

        ctx.step("THEN the signed-in state is saved", async {
            let path = &ctx.config().run.storage_state;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            ctx.page().await?.storage_state(path).await?;
            info!(path = %path.display(), "Storage state saved");
            Ok(())
        })
        .await
    })
}
