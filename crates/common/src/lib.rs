//! Storefront E2E Common Library
//!
//! Run configuration and test data shared by the page objects, the API
//! helpers and the runner.

pub mod config;
pub mod data;
pub mod error;

// Re-export commonly used types
pub use config::{
    BrowserSettings, ConsentSettings, Credentials, RunSettings, SiteConfig, TestConfig,
};
pub use data::{AeUser, Country, LoginCredentials, UserResponse};
pub use error::{ConfigError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment used when `ENVIRONMENT` is not set
pub const DEFAULT_ENVIRONMENT: &str = "dev";
