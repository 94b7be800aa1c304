//! Scenario catalog
//!
//! Each scenario is a plain function from a
//! [`TestContext`](crate::fixtures::TestContext) to a boxed
//! future, registered with its tags and project.

pub mod api;
pub mod setup;
pub mod ui;

use crate::error::{E2eError, E2eResult};
use crate::runner::Scenario;

/// Every scenario of the suite, setup first
pub fn catalog() -> Vec<Scenario> {
    setup::scenarios()
        .into_iter()
        .chain(ui::scenarios())
        .chain(api::scenarios())
        .collect()
}

/// Fail with `message` unless `condition` holds
pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message()))
    }
}
