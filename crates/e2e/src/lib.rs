//! Storefront E2E Test Framework
//!
//! Rust-controlled browser and API tests for the AutomationExercise demo
//! shop and a public practice API:
//! - Controls Playwright through a small Node driver speaking JSON lines
//! - Page objects built around a single page handle per test
//! - Clears consent overlays before assertions, failing loudly only when
//!   an overlay was clicked and never went away
//! - API helpers with typed response contracts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── setup project  -> storage state                      │
//! │    ├── chromium / api scenarios (buffer_unordered)          │
//! │    └── write_results -> test-results.json                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestContext (per attempt)                                  │
//! │    ├── page()  -> PageFactory -> Arc<dyn Page>              │
//! │    ├── ae()    -> PageObjectGraph                           │
//! │    │     ├── home, auth, products, product_details, ...     │
//! │    │     └── Arc<dyn ConsentCapability> (one per graph)     │
//! │    └── api()   -> ApiClient                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod consent;
pub mod error;
pub mod expect;
pub mod fixtures;
pub mod pages;
pub mod playwright;
pub mod runner;
pub mod scenarios;
pub mod testing;

pub use browser::{Locator, Page, SharedPage, TextMatch, WaitState};
pub use consent::{
    ConsentCapability, ConsentError, ConsentOutcome, ConsentResolver, NoConsent, OverlayVariant,
    PageConsent, SelectorStrategy, SharedConsent,
};
pub use error::{BrowserError, BrowserResult, E2eError, E2eResult};
pub use fixtures::{PageFactory, TestContext};
pub use pages::{PageObject, PageObjectGraph};
pub use runner::{Project, RunFilter, Scenario, TestRunner};
