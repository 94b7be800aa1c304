//! Error types for E2E testing

use thiserror::Error;

use crate::consent::ConsentError;

/// Failures reported by the browser collaborator
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout after {timeout_ms} ms waiting for: {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Click on {target} intercepted by {blocker}")]
    Intercepted { target: String, blocker: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Page is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrowserError {
    /// Absence-type failures: the element is not there (yet)
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            BrowserError::ElementNotFound(_) | BrowserError::Timeout { .. }
        )
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Consent(#[from] ConsentError),

    #[error("Configuration error: {0}")]
    Config(#[from] storefront_common::ConfigError),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Contract violation in {contract}: {reason}")]
    Schema { contract: &'static str, reason: String },

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Test timed out after {0} ms")]
    TestTimeout(u64),

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
