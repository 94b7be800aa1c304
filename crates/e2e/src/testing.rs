//! In-process stand-ins for the browser collaborator
//!
//! [`ScriptedPage`] is a tiny DOM: nodes with a role, accessible name,
//! classes and test id, arranged in a tree, each visible until an
//! optional deadline. Clicks run scripted effects (hide a node after a
//! delay, show one, navigate). Visible nodes marked as blocking layers
//! intercept clicks on everything below them, the way a consent mask
//! does. Waits poll on the tokio clock, so tests can run with
//! `start_paused = true`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::browser::{Locator, Page, SharedPage, WaitState};
use crate::consent::{ConsentCapability, ConsentResult};
use crate::error::{BrowserError, BrowserResult, E2eResult};
use crate::fixtures::PageFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Layer {
    #[default]
    Page,
    /// Intercepts clicks aimed at the page layer
    Blocking,
    /// Sits above blocking layers
    Modal,
}

/// Scripted element
#[derive(Debug, Clone, Default)]
pub struct Node {
    role: Option<String>,
    name: String,
    classes: Vec<String>,
    html_id: Option<String>,
    test_id: Option<String>,
    placeholder: Option<String>,
    parent: Option<NodeId>,
    visible: bool,
    hide_at: Option<Instant>,
    layer: Layer,
}

impl Node {
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    /// Element with an ARIA role and accessible name
    pub fn role(role: &str, name: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            name: name.to_string(),
            ..Self::new()
        }
    }

    /// Element known only by its class
    pub fn class(class: &str) -> Self {
        Self::new().with_class(class)
    }

    /// Plain text element
    pub fn text(text: &str) -> Self {
        Self {
            name: text.to_string(),
            ..Self::new()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.html_id = Some(id.to_string());
        self
    }

    pub fn with_test_id(mut self, test_id: &str) -> Self {
        self.test_id = Some(test_id.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn inside(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Goes away on its own `after` from now, without any click
    pub fn vanishes_after(mut self, after: Duration) -> Self {
        self.hide_at = Some(Instant::now() + after);
        self
    }

    /// Transparent layer that swallows clicks on the page below
    pub fn blocking(mut self) -> Self {
        self.layer = Layer::Blocking;
        self
    }

    /// Dialog drawn above blocking layers
    pub fn modal(mut self) -> Self {
        self.layer = Layer::Modal;
        self
    }
}

/// What a click on a node does
#[derive(Debug, Clone)]
pub enum Effect {
    Hide { node: NodeId, after: Duration },
    Show(NodeId),
    Navigate { url: String },
}

impl Effect {
    pub fn hide(node: NodeId) -> Self {
        Effect::Hide {
            node,
            after: Duration::ZERO,
        }
    }

    pub fn hide_after(node: NodeId, after: Duration) -> Self {
        Effect::Hide { node, after }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Effect::Navigate { url: url.into() }
    }
}

#[derive(Debug, Default)]
struct Dom {
    nodes: Vec<Node>,
    effects: Vec<(NodeId, Effect)>,
    url: String,
    title: String,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    selections: Vec<(String, String)>,
    checks: Vec<String>,
    visits: Vec<String>,
    cookies_cleared: usize,
    closed: bool,
}

impl Dom {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn is_visible(&self, id: NodeId, now: Instant) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            if !node.visible || node.hide_at.is_some_and(|at| now >= at) {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(id).parent;
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.node(cur).parent;
        }
        false
    }

    fn layer_of(&self, id: NodeId) -> Layer {
        let mut current = Some(id);
        while let Some(cur) = current {
            let layer = self.node(cur).layer;
            if layer != Layer::Page {
                return layer;
            }
            current = self.node(cur).parent;
        }
        Layer::Page
    }

    fn all(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Matching nodes in document order
    fn resolve(&self, locator: &Locator, scope: Option<&[NodeId]>) -> Vec<NodeId> {
        let in_scope = |id: NodeId| match scope {
            Some(roots) => roots.iter().any(|root| self.is_descendant(id, *root)),
            None => true,
        };

        match locator {
            Locator::Role { role, name } => self
                .all()
                .filter(|id| in_scope(*id))
                .filter(|id| {
                    let node = self.node(*id);
                    node.role.as_deref() == Some(role.as_str())
                        && name.as_ref().map_or(true, |m| m.matches(&node.name))
                })
                .collect(),
            Locator::Text { text } => self
                .all()
                .filter(|id| in_scope(*id))
                .filter(|id| {
                    let node = self.node(*id);
                    !node.name.is_empty() && text.matches(&node.name)
                })
                .collect(),
            Locator::TestId { id: wanted } => self
                .all()
                .filter(|id| in_scope(*id))
                .filter(|id| self.node(*id).test_id.as_deref() == Some(wanted.as_str()))
                .collect(),
            Locator::Placeholder { text } => self
                .all()
                .filter(|id| in_scope(*id))
                .filter(|id| {
                    self.node(*id)
                        .placeholder
                        .as_deref()
                        .is_some_and(|p| text.matches(p))
                })
                .collect(),
            Locator::Css { selector } => {
                // Descendant chains of `.class`, `#id` and `.a.b` compounds
                let mut matched: Option<Vec<NodeId>> = scope.map(<[NodeId]>::to_vec);
                for part in selector.split_whitespace() {
                    let roots = matched.clone();
                    matched = Some(
                        self.all()
                            .filter(|id| match &roots {
                                Some(roots) => roots.iter().any(|r| self.is_descendant(*id, *r)),
                                None => true,
                            })
                            .filter(|id| css_matches(self.node(*id), part))
                            .collect(),
                    );
                }
                matched.unwrap_or_default()
            }
            Locator::Within { scope: outer, inner } => {
                let roots = self.resolve(outer, scope);
                if roots.is_empty() {
                    return Vec::new();
                }
                self.resolve(inner, Some(&roots))
            }
            Locator::First { inner } => self.resolve(inner, scope).into_iter().take(1).collect(),
            Locator::Or { options } => {
                let mut ids: Vec<NodeId> = options
                    .iter()
                    .flat_map(|o| self.resolve(o, scope))
                    .collect();
                ids.sort_by_key(|id| id.0);
                ids.dedup();
                ids
            }
        }
    }

    fn first_visible(&self, locator: &Locator, now: Instant) -> Option<bool> {
        self.resolve(locator, None)
            .first()
            .map(|id| self.is_visible(*id, now))
    }

    fn satisfied(&self, locator: &Locator, state: WaitState, now: Instant) -> bool {
        match state {
            WaitState::Visible => self.first_visible(locator, now) == Some(true),
            WaitState::Hidden => self.first_visible(locator, now) != Some(true),
            WaitState::Attached => !self.resolve(locator, None).is_empty(),
            WaitState::Detached => self.resolve(locator, None).is_empty(),
        }
    }

    /// Visible target node for an action
    fn target(&self, locator: &Locator, now: Instant) -> BrowserResult<NodeId> {
        let id = *self
            .resolve(locator, None)
            .first()
            .ok_or_else(|| BrowserError::ElementNotFound(locator.to_string()))?;
        if !self.is_visible(id, now) {
            return Err(BrowserError::Timeout {
                what: format!("{locator} to be visible"),
                timeout_ms: 0,
            });
        }
        Ok(id)
    }
}

fn css_matches(node: &Node, compound: &str) -> bool {
    let mut rest = compound;
    let mut matched_any = false;
    while !rest.is_empty() {
        let (kind, body) = rest.split_at(1);
        let end = body.find(['.', '#']).unwrap_or(body.len());
        let (token, tail) = body.split_at(end);
        let ok = match kind {
            "." => node.classes.iter().any(|c| c == token),
            "#" => node.html_id.as_deref() == Some(token),
            _ => false,
        };
        if !ok {
            return false;
        }
        matched_any = true;
        rest = tail;
    }
    matched_any
}

/// Scripted [`Page`] implementation
pub struct ScriptedPage {
    dom: Mutex<Dom>,
    poll_interval: Duration,
}

impl ScriptedPage {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            dom: Mutex::new(Dom {
                url: url.to_string(),
                title: title.to_string(),
                ..Default::default()
            }),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn add(&self, node: Node) -> NodeId {
        let mut dom = self.dom.lock();
        dom.nodes.push(node);
        NodeId(dom.nodes.len() - 1)
    }

    pub fn on_click(&self, node: NodeId, effect: Effect) {
        self.dom.lock().effects.push((node, effect));
    }

    pub fn set_title(&self, title: &str) {
        self.dom.lock().title = title.to_string();
    }

    pub fn is_shown(&self, node: NodeId) -> bool {
        self.dom.lock().is_visible(node, Instant::now())
    }

    /// Locators clicked so far, rendered as selectors
    pub fn clicks(&self) -> Vec<String> {
        self.dom.lock().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.dom.lock().fills.clone()
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.dom.lock().selections.clone()
    }

    pub fn checks(&self) -> Vec<String> {
        self.dom.lock().checks.clone()
    }

    /// URLs passed to `goto`
    pub fn visits(&self) -> Vec<String> {
        self.dom.lock().visits.clone()
    }

    pub fn cookies_cleared(&self) -> usize {
        self.dom.lock().cookies_cleared
    }

    pub fn is_closed(&self) -> bool {
        self.dom.lock().closed
    }

    fn ensure_open(&self) -> BrowserResult<()> {
        if self.dom.lock().closed {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock();
        dom.url = url.to_string();
        dom.visits.push(url.to_string());
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> BrowserResult<()> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut dom = self.dom.lock();
        let target = dom.target(locator, now)?;

        if dom.layer_of(target) == Layer::Page {
            let blocker = dom.all().find(|id| {
                dom.node(*id).layer == Layer::Blocking
                    && dom.is_visible(*id, now)
                    && *id != target
                    && !dom.is_descendant(target, *id)
            });
            if let Some(blocker) = blocker {
                return Err(BrowserError::Intercepted {
                    target: locator.to_string(),
                    blocker: format!("{:?}", dom.node(blocker).classes),
                });
            }
        }

        dom.clicks.push(locator.to_string());
        let effects: Vec<Effect> = dom
            .effects
            .iter()
            .filter(|(node, _)| *node == target)
            .map(|(_, effect)| effect.clone())
            .collect();
        for effect in effects {
            match effect {
                Effect::Hide { node, after } => {
                    if after.is_zero() {
                        dom.nodes[node.0].visible = false;
                    } else {
                        dom.nodes[node.0].hide_at = Some(now + after);
                    }
                }
                Effect::Show(node) => {
                    let n = &mut dom.nodes[node.0];
                    n.visible = true;
                    n.hide_at = None;
                }
                Effect::Navigate { url } => dom.url = url,
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock();
        dom.target(locator, Instant::now())?;
        dom.fills.push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock();
        dom.target(locator, Instant::now())?;
        dom.selections.push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn check(&self, locator: &Locator) -> BrowserResult<()> {
        self.ensure_open()?;
        let mut dom = self.dom.lock();
        dom.target(locator, Instant::now())?;
        dom.checks.push(locator.to_string());
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool> {
        self.ensure_open()?;
        Ok(self.dom.lock().first_visible(locator, Instant::now()) == Some(true))
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        timeout: Duration,
    ) -> BrowserResult<()> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if self.dom.lock().satisfied(locator, state, now) {
                return Ok(());
            }
            if now >= deadline {
                return Err(BrowserError::Timeout {
                    what: format!("{locator} to be {state:?}"),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        self.ensure_open()?;
        Ok(self.dom.lock().resolve(locator, None).len())
    }

    async fn url(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.dom.lock().url.clone())
    }

    async fn title(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.dom.lock().title.clone())
    }

    async fn storage_state(&self, path: &Path) -> BrowserResult<()> {
        self.ensure_open()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = serde_json::json!({ "cookies": [], "origins": [] });
        std::fs::write(path, serde_json::to_vec_pretty(&state)?)?;
        Ok(())
    }

    async fn clear_cookies(&self) -> BrowserResult<()> {
        self.ensure_open()?;
        self.dom.lock().cookies_cleared += 1;
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        self.dom.lock().closed = true;
        Ok(())
    }
}

/// Capability that only counts calls
#[derive(Default)]
pub struct CountingConsent {
    calls: AtomicUsize,
}

impl CountingConsent {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentCapability for CountingConsent {
    async fn accept_if_visible(&self) -> ConsentResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type PageBuilder = Box<dyn Fn() -> Arc<ScriptedPage> + Send + Sync>;

/// Opens a fresh [`ScriptedPage`] per test and remembers them
pub struct ScriptedPageFactory {
    build: PageBuilder,
    opened: Mutex<Vec<(Arc<ScriptedPage>, Option<PathBuf>)>>,
}

impl ScriptedPageFactory {
    pub fn new(build: impl Fn() -> Arc<ScriptedPage> + Send + Sync + 'static) -> Self {
        Self {
            build: Box::new(build),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Pages opened so far with the storage state each was seeded from
    pub fn opened(&self) -> Vec<(Arc<ScriptedPage>, Option<PathBuf>)> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl PageFactory for ScriptedPageFactory {
    async fn open_page(&self, storage_state: Option<&Path>) -> E2eResult<SharedPage> {
        let page = (self.build)();
        self.opened
            .lock()
            .push((page.clone(), storage_state.map(Path::to_path_buf)));
        Ok(page as SharedPage)
    }
}
