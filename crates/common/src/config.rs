//! Run configuration
//!
//! A [`TestConfig`] is built once per run from `config/<ENVIRONMENT>.toml`
//! plus a fixed set of environment overrides, then passed by reference
//! into every page object, API client and runner that needs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::DEFAULT_ENVIRONMENT;

/// Top-level configuration for one test run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Environment name (`dev`, `staging`, ...)
    pub environment: String,

    /// Target URLs
    pub site: SiteConfig,

    /// Login credentials for the demo application
    pub credentials: Option<Credentials>,

    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Consent overlay timing
    pub consent: ConsentSettings,

    /// Runner settings
    pub run: RunSettings,
}

/// Base URLs of the systems under test
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Frontend application URL
    pub app_url: Option<String>,

    /// Backend API URL
    pub api_url: Option<String>,

    /// Utility service URL
    pub utility_url: Option<String>,
}

impl SiteConfig {
    /// Frontend base URL, required by every page object that navigates
    pub fn app_url(&self) -> Result<&str> {
        self.app_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or(ConfigError::Missing("APP_URL"))
    }

    /// API base URL
    pub fn api_url(&self) -> Result<&str> {
        self.api_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or(ConfigError::Missing("API_URL"))
    }

    /// Join a path onto the frontend base URL
    pub fn app_path(&self, path: &str) -> Result<String> {
        Ok(join_url(self.app_url()?, path))
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Email/password pair for the demo application
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Browser engine (chromium, firefox, webkit)
    pub browser: String,

    /// Run without a visible window
    pub headless: bool,

    /// Viewport dimensions
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Attribute used by test-id locators
    pub test_id_attribute: String,

    /// Timeout for single actions (click, fill)
    pub action_timeout_ms: u64,

    /// Timeout for page navigations
    pub navigation_timeout_ms: u64,

    /// Timeout for polling assertions
    pub expect_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browser: "chromium".to_string(),
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            test_id_attribute: "data-qa".to_string(),
            action_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            expect_timeout_ms: 10_000,
        }
    }
}

impl BrowserSettings {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.expect_timeout_ms)
    }
}

/// Consent overlay timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentSettings {
    /// Handle consent overlays at all
    pub enabled: bool,

    /// How long to look for an overlay before treating it as absent
    pub probe_timeout_ms: u64,

    /// How long a dismissed overlay may take to disappear
    pub confirm_timeout_ms: u64,
}

impl Default for ConsentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_timeout_ms: 1_500,
            confirm_timeout_ms: 5_000,
        }
    }
}

impl ConsentSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Running under CI
    pub ci: bool,

    /// Extra attempts for a failed test
    pub retries: u32,

    /// Parallel tests (None = available parallelism)
    pub workers: Option<usize>,

    /// Whole-test timeout
    pub test_timeout_ms: u64,

    /// Directory for results
    pub output_dir: PathBuf,

    /// Storage state written by the setup project
    pub storage_state: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            ci: false,
            retries: 0,
            workers: None,
            test_timeout_ms: 60_000,
            output_dir: PathBuf::from("test-results"),
            storage_state: PathBuf::from("storage/.auth/automationexercise.json"),
        }
    }
}

impl RunSettings {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    /// Number of tests to run concurrently
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl TestConfig {
    /// Load configuration from `config_dir` and the process environment
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_with(config_dir, |key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables
    pub fn load_with<F>(config_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let path = config_dir.join(format!("{environment}.toml"));

        let mut config = if path.exists() {
            debug!("Loading config from {}", path.display());
            Self::from_file(&path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.environment = environment;
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply environment overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("APP_URL") {
            self.site.app_url = Some(url);
        }
        if let Some(url) = lookup("API_URL") {
            self.site.api_url = Some(url);
        }
        if let Some(url) = lookup("UTILITY_URL") {
            self.site.utility_url = Some(url);
        }

        if let (Some(email), Some(password)) = (lookup("APP_EMAIL"), lookup("APP_PASSWORD")) {
            self.credentials = Some(Credentials { email, password });
        }

        let ci = lookup("CI")
            .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false);
        if ci {
            // CI profile: retry flaky tests, one worker for stability
            self.run.ci = true;
            self.run.retries = 2;
            self.run.workers = Some(1);
        }
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.browser.browser.as_str(), "chromium" | "firefox" | "webkit") {
            return Err(ConfigError::Invalid(format!(
                "unknown browser '{}'",
                self.browser.browser
            )));
        }
        if self.consent.probe_timeout_ms == 0 || self.consent.confirm_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "consent timeouts must be non-zero".to_string(),
            ));
        }
        if self.run.test_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "test timeout must be non-zero".to_string(),
            ));
        }
        if self.run.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
