//! Consent overlay handling
//!
//! [`ConsentResolver::resolve`] makes one bounded attempt to clear a
//! consent banner:
//!
//! ```text
//! UNKNOWN -> probe -> ABSENT                                  (Ok(Absent))
//!                  -> PRESENT -> click -> DISMISSING -> confirm
//!                                   -> CONFIRMED              (Ok(Dismissed))
//!                                   -> TIMEOUT                (Err(StateTransitionTimeout))
//! ```
//!
//! Absence is the common case and never an error. Only an overlay that
//! was found, clicked and then failed to go away is reported.
//!
//! Page objects never see the resolver directly; they hold the
//! [`ConsentCapability`] trait object shared across their graph.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use storefront_common::ConsentSettings;

use crate::browser::{Locator, Page, SharedPage, WaitState};

/// Accessible name of the affirmative control ("Consent", "I Consent")
pub const ACCEPT_LABEL_PATTERN: &str = r"^\s*(i\s+)?consent\s*$";

/// Extra time allowed for the driver round trip past the confirm deadline
const CONFIRM_SLACK: Duration = Duration::from_millis(50);

/// How an overlay variant is located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    /// ARIA role and accessible name
    Semantic,
    /// CSS structure, for containers without semantic attributes
    Structural,
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorStrategy::Semantic => f.write_str("semantic"),
            SelectorStrategy::Structural => f.write_str("structural"),
        }
    }
}

/// One known consent overlay implementation
#[derive(Debug, Clone)]
pub struct OverlayVariant {
    pub name: &'static str,
    /// Overlay container
    pub root: Locator,
    /// Affirmative control, resolved inside `root`
    pub accept: Locator,
    /// Layers that keep intercepting clicks until they are hidden
    pub blockers: Vec<Locator>,
    pub strategy: SelectorStrategy,
}

impl OverlayVariant {
    /// Generic `role=dialog` banner named after consent, cookies or privacy
    pub fn consent_dialog() -> Self {
        Self {
            name: "consent-dialog",
            root: Locator::role_matching("dialog", "consent|cookie|privacy"),
            accept: Locator::role_matching("button", ACCEPT_LABEL_PATTERN),
            blockers: Vec::new(),
            strategy: SelectorStrategy::Semantic,
        }
    }

    /// Google Funding Choices banner used by AutomationExercise.
    ///
    /// The container has no role or accessible name, so it is matched by
    /// class. The button inside is still matched by role and name. The
    /// `.fc-dialog-overlay` mask outlives the dialog and must be gone too.
    pub fn funding_choices() -> Self {
        Self {
            name: "funding-choices",
            root: Locator::css(".fc-consent-root"),
            accept: Locator::role_matching("button", ACCEPT_LABEL_PATTERN),
            blockers: vec![Locator::css(".fc-dialog-overlay")],
            strategy: SelectorStrategy::Structural,
        }
    }

    fn root_locator(&self) -> Locator {
        self.root.clone().first()
    }

    fn accept_locator(&self) -> Locator {
        self.root_locator().locate(self.accept.clone().first())
    }
}

/// Result of one resolve call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// No overlay within the probe timeout; nothing was clicked
    Absent,
    /// The overlay was clicked away and confirmed hidden
    Dismissed { variant: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsentError {
    #[error(
        "Consent overlay '{variant}' still blocking {timeout_ms} ms after dismissal \
         (selector: {selector}, strategy: {strategy})"
    )]
    StateTransitionTimeout {
        variant: &'static str,
        selector: String,
        strategy: SelectorStrategy,
        timeout_ms: u64,
    },
}

pub type ConsentResult<T> = Result<T, ConsentError>;

/// Detects, dismisses and confirms removal of consent overlays
#[derive(Debug, Clone)]
pub struct ConsentResolver {
    variants: Vec<OverlayVariant>,
    probe_timeout: Duration,
    confirm_timeout: Duration,
}

impl Default for ConsentResolver {
    fn default() -> Self {
        Self::new(&ConsentSettings::default())
    }
}

impl ConsentResolver {
    pub fn new(settings: &ConsentSettings) -> Self {
        Self {
            variants: Self::default_variants(),
            probe_timeout: settings.probe_timeout(),
            confirm_timeout: settings.confirm_timeout(),
        }
    }

    /// Known variants in priority order
    pub fn default_variants() -> Vec<OverlayVariant> {
        vec![
            OverlayVariant::funding_choices(),
            OverlayVariant::consent_dialog(),
        ]
    }

    /// Replace the variant list (priority order)
    pub fn with_variants(mut self, variants: Vec<OverlayVariant>) -> Self {
        self.variants = variants;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    pub fn variants(&self) -> &[OverlayVariant] {
        &self.variants
    }

    /// Clear a consent overlay if one is showing
    pub async fn resolve(&self, page: &dyn Page) -> ConsentResult<ConsentOutcome> {
        let started = Instant::now();

        let Some(variant) = self.detect(page).await else {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Consent overlay absent"
            );
            return Ok(ConsentOutcome::Absent);
        };
        debug!(
            variant = variant.name,
            strategy = %variant.strategy,
            "Consent overlay present"
        );

        // A failed click is not fatal: the overlay may have gone on its own.
        // The confirm step decides.
        let accept = variant.accept_locator();
        if let Err(e) = page.click(&accept).await {
            warn!(variant = variant.name, "Consent click on {} failed: {}", accept, e);
        }
        debug!(variant = variant.name, "Dismissing consent overlay");

        self.confirm(page, variant).await?;

        info!(
            variant = variant.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Consent overlay dismissed"
        );
        Ok(ConsentOutcome::Dismissed {
            variant: variant.name,
        })
    }

    /// Probe all variants concurrently; the highest-priority visible one wins
    async fn detect(&self, page: &dyn Page) -> Option<&OverlayVariant> {
        let mut probes: FuturesUnordered<_> = self
            .variants
            .iter()
            .enumerate()
            .map(|(index, variant)| async move { (index, self.probe(page, variant).await) })
            .collect();

        let mut seen: Vec<Option<bool>> = vec![None; self.variants.len()];
        while let Some((index, visible)) = probes.next().await {
            seen[index] = Some(visible);
            for (i, state) in seen.iter().enumerate() {
                match state {
                    Some(true) => return Some(&self.variants[i]),
                    Some(false) => continue,
                    None => break,
                }
            }
        }
        None
    }

    async fn probe(&self, page: &dyn Page, variant: &OverlayVariant) -> bool {
        let root = variant.root_locator();
        match page
            .wait_for(&root, WaitState::Visible, self.probe_timeout)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                if !e.is_absence() {
                    debug!(variant = variant.name, "Consent probe error treated as absent: {}", e);
                }
                false
            }
        }
    }

    /// Wait for the root and every blocking layer to be hidden, all inside
    /// one confirm deadline
    async fn confirm(&self, page: &dyn Page, variant: &OverlayVariant) -> ConsentResult<()> {
        let deadline = Instant::now() + self.confirm_timeout;
        let hard_deadline = deadline + CONFIRM_SLACK;

        let targets = std::iter::once(variant.root_locator()).chain(variant.blockers.iter().cloned());
        for locator in targets {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = page.wait_for(&locator, WaitState::Hidden, remaining);

            let hidden = matches!(tokio::time::timeout_at(hard_deadline, wait).await, Ok(Ok(())));
            if !hidden {
                return Err(ConsentError::StateTransitionTimeout {
                    variant: variant.name,
                    selector: locator.to_string(),
                    strategy: variant.strategy,
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                });
            }
        }
        Ok(())
    }
}

/// The one operation page objects need for consent overlays
#[async_trait]
pub trait ConsentCapability: Send + Sync {
    /// Dismiss a consent overlay if one is showing. Returns immediately
    /// when none is.
    async fn accept_if_visible(&self) -> ConsentResult<()>;
}

/// Capability shared by all page objects of one graph
pub type SharedConsent = Arc<dyn ConsentCapability>;

/// Default capability: [`ConsentResolver`] bound to one page
pub struct PageConsent {
    page: SharedPage,
    resolver: ConsentResolver,
}

impl PageConsent {
    pub fn new(page: SharedPage, resolver: ConsentResolver) -> Self {
        Self { page, resolver }
    }

    pub fn shared(page: SharedPage, resolver: ConsentResolver) -> SharedConsent {
        Arc::new(Self::new(page, resolver))
    }
}

#[async_trait]
impl ConsentCapability for PageConsent {
    async fn accept_if_visible(&self) -> ConsentResult<()> {
        self.resolver.resolve(self.page.as_ref()).await.map(drop)
    }
}

/// Capability that leaves the page alone, for runs with consent
/// handling switched off
pub struct NoConsent;

#[async_trait]
impl ConsentCapability for NoConsent {
    async fn accept_if_visible(&self) -> ConsentResult<()> {
        Ok(())
    }
}
