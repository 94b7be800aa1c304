//! Playwright browser automation
//!
//! Every [`PlaywrightPage`] owns one Node.js driver process that launches
//! the configured browser with a fresh context and then serves commands
//! as newline-delimited JSON over stdin/stdout:
//!
//! ```text
//! -> {"id":7,"op":"wait_for","locator":{...},"state":"visible","timeout_ms":1500}
//! <- {"id":7,"ok":false,"error":{"kind":"timeout","message":"..."}}
//! ```
//!
//! Replies are routed back to callers by id, so concurrent requests on
//! one page (the consent probes) do not queue behind each other.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use storefront_common::BrowserSettings;

use crate::browser::{Locator, Page, WaitState};
use crate::error::{BrowserError, BrowserResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{other}'")),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub test_id_attribute: String,
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default())
    }
}

impl PlaywrightConfig {
    pub fn from_settings(settings: &BrowserSettings) -> Self {
        let browser = settings.browser.parse().unwrap_or_else(|e| {
            warn!("{}, falling back to chromium", e);
            Browser::Chromium
        });
        Self {
            browser,
            headless: settings.headless,
            viewport_width: settings.viewport_width,
            viewport_height: settings.viewport_height,
            test_id_attribute: settings.test_id_attribute.clone(),
            action_timeout: settings.action_timeout(),
            navigation_timeout: settings.navigation_timeout(),
        }
    }
}

/// Settings handed to the driver script
#[derive(Debug, Serialize)]
struct DriverSettings<'a> {
    browser: &'static str,
    headless: bool,
    viewport: Viewport,
    test_id_attribute: &'a str,
    action_timeout_ms: u64,
    navigation_timeout_ms: u64,
    storage_state: Option<String>,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

/// Spawns one driver per page
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    /// Create a launcher, verifying Playwright is installed
    pub fn new(config: PlaywrightConfig) -> BrowserResult<Self> {
        Self::check_playwright_installed()?;
        Ok(Self { config })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> BrowserResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(BrowserError::PlaywrightNotFound),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Launch a browser with a fresh context, optionally seeded from a
    /// storage state file, and return its single page
    pub async fn launch(&self, storage_state: Option<&Path>) -> BrowserResult<PlaywrightPage> {
        let settings = DriverSettings {
            browser: self.config.browser.as_str(),
            headless: self.config.headless,
            viewport: Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
            },
            test_id_attribute: &self.config.test_id_attribute,
            action_timeout_ms: millis(self.config.action_timeout),
            navigation_timeout_ms: millis(self.config.navigation_timeout),
            storage_state: storage_state.map(|p| p.display().to_string()),
        };

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_driver_script(&serde_json::to_string(&settings)?))?;

        debug!("Running Playwright driver: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Resolve `playwright` from the invoking project, not the temp dir
        if let Ok(cwd) = std::env::current_dir() {
            cmd.env("NODE_PATH", cwd.join("node_modules"));
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrowserError::Driver("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrowserError::Driver("driver stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Driver("driver stderr unavailable".to_string()))?;

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        // id 0 is the launch handshake
        let (ready_tx, ready_rx) = oneshot::channel();
        pending.lock().insert(0, ready_tx);

        tokio::spawn(route_replies(stdout, pending.clone(), closed.clone()));
        tokio::spawn(log_stderr(stderr));

        let page = PlaywrightPage {
            config: self.config.clone(),
            stdin: AsyncMutex::new(Some(stdin)),
            child: AsyncMutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            _script_dir: script_dir,
        };

        let launch_timeout = self.config.navigation_timeout;
        let reply = tokio::time::timeout(launch_timeout, ready_rx)
            .await
            .map_err(|_| BrowserError::Timeout {
                what: "browser launch".to_string(),
                timeout_ms: millis(launch_timeout),
            })?
            .map_err(|_| BrowserError::Closed)?;

        if !reply.ok {
            return Err(driver_error(
                reply.error,
                "browser launch".to_string(),
                millis(launch_timeout),
            ));
        }

        info!(
            "Launched {} ({}x{})",
            self.config.browser.as_str(),
            self.config.viewport_width,
            self.config.viewport_height
        );
        Ok(page)
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// A page served by a Playwright driver process
pub struct PlaywrightPage {
    config: PlaywrightConfig,
    stdin: AsyncMutex<Option<ChildStdin>>,
    child: AsyncMutex<Option<Child>>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    _script_dir: tempfile::TempDir,
}

/// Driver command
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Goto {
        url: &'a str,
    },
    Click {
        locator: &'a Locator,
    },
    Fill {
        locator: &'a Locator,
        value: &'a str,
    },
    SelectOption {
        locator: &'a Locator,
        value: &'a str,
    },
    Check {
        locator: &'a Locator,
    },
    IsVisible {
        locator: &'a Locator,
    },
    WaitFor {
        locator: &'a Locator,
        state: WaitState,
        timeout_ms: u64,
    },
    Count {
        locator: &'a Locator,
    },
    Url,
    Title,
    StorageState {
        path: String,
    },
    ClearCookies,
    Close,
}

impl DriverCommand<'_> {
    /// Human-readable target, used in error messages
    fn describe(&self) -> String {
        match self {
            DriverCommand::Goto { url } => format!("navigate:{url}"),
            DriverCommand::Click { locator } => format!("click:{locator}"),
            DriverCommand::Fill { locator, .. } => format!("fill:{locator}"),
            DriverCommand::SelectOption { locator, .. } => format!("select:{locator}"),
            DriverCommand::Check { locator } => format!("check:{locator}"),
            DriverCommand::IsVisible { locator } => format!("is_visible:{locator}"),
            DriverCommand::WaitFor { locator, state, .. } => format!("wait:{locator} ({state:?})"),
            DriverCommand::Count { locator } => format!("count:{locator}"),
            DriverCommand::Url => "url".to_string(),
            DriverCommand::Title => "title".to_string(),
            DriverCommand::StorageState { path } => format!("storage_state:{path}"),
            DriverCommand::ClearCookies => "clear_cookies".to_string(),
            DriverCommand::Close => "close".to_string(),
        }
    }

    fn timeout_ms(&self, config: &PlaywrightConfig) -> u64 {
        match self {
            DriverCommand::WaitFor { timeout_ms, .. } => *timeout_ms,
            DriverCommand::Goto { .. } => millis(config.navigation_timeout),
            _ => millis(config.action_timeout),
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a DriverCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<DriverFailure>,
}

#[derive(Debug, Deserialize)]
struct DriverFailure {
    kind: String,
    message: String,
}

fn driver_error(failure: Option<DriverFailure>, what: String, timeout_ms: u64) -> BrowserError {
    let Some(failure) = failure else {
        return BrowserError::Driver(format!("{what}: driver reported failure without details"));
    };
    match failure.kind.as_str() {
        "timeout" => BrowserError::Timeout { what, timeout_ms },
        "not_found" => BrowserError::ElementNotFound(what),
        "intercepted" => BrowserError::Intercepted {
            target: what,
            blocker: failure.message,
        },
        _ => BrowserError::Driver(format!("{what}: {}", failure.message)),
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

async fn route_replies(stdout: ChildStdout, pending: Pending, closed: Arc<AtomicBool>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<Reply>(&line) {
                Ok(reply) => {
                    let waiter = pending.lock().remove(&reply.id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(reply);
                        }
                        None => warn!("Driver reply for unknown request {}", reply.id),
                    }
                }
                Err(_) => debug!("[driver] {}", line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Driver stdout error: {}", e);
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiter with `Closed`
    pending.lock().clear();
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[driver stderr] {}", line);
    }
}

impl PlaywrightPage {
    async fn call(&self, command: DriverCommand<'_>) -> BrowserResult<serde_json::Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let what = command.describe();
        let timeout_ms = command.timeout_ms(&self.config);
        let mut line = serde_json::to_string(&Envelope {
            id,
            command: &command,
        })?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.send_line(&line).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        let reply = rx.await.map_err(|_| BrowserError::Closed)?;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(driver_error(reply.error, what, timeout_ms))
        }
    }

    async fn send_line(&self, line: &str) -> BrowserResult<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(BrowserError::Closed)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.call(DriverCommand::Goto { url }).await.map(drop)
    }

    async fn click(&self, locator: &Locator) -> BrowserResult<()> {
        self.call(DriverCommand::Click { locator }).await.map(drop)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.call(DriverCommand::Fill { locator, value }).await.map(drop)
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> BrowserResult<()> {
        self.call(DriverCommand::SelectOption { locator, value })
            .await
            .map(drop)
    }

    async fn check(&self, locator: &Locator) -> BrowserResult<()> {
        self.call(DriverCommand::Check { locator }).await.map(drop)
    }

    async fn is_visible(&self, locator: &Locator) -> BrowserResult<bool> {
        let value = self.call(DriverCommand::IsVisible { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        timeout: Duration,
    ) -> BrowserResult<()> {
        // Playwright treats 0 as "no timeout"
        let timeout_ms = millis(timeout).max(1);
        self.call(DriverCommand::WaitFor {
            locator,
            state,
            timeout_ms,
        })
        .await
        .map(drop)
    }

    async fn count(&self, locator: &Locator) -> BrowserResult<usize> {
        let value = self.call(DriverCommand::Count { locator }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn url(&self) -> BrowserResult<String> {
        let value = self.call(DriverCommand::Url).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn title(&self) -> BrowserResult<String> {
        let value = self.call(DriverCommand::Title).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn storage_state(&self, path: &Path) -> BrowserResult<()> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let path = path.display().to_string();
        self.call(DriverCommand::StorageState { path }).await.map(drop)
    }

    async fn clear_cookies(&self) -> BrowserResult<()> {
        self.call(DriverCommand::ClearCookies).await.map(drop)
    }

    async fn close(&self) -> BrowserResult<()> {
        if !self.closed.load(Ordering::SeqCst) {
            match self.call(DriverCommand::Close).await {
                Ok(_) | Err(BrowserError::Closed) => {}
                Err(e) => warn!("Driver close failed: {}", e),
            }
        }
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(5), child.wait())
                .await
                .is_err()
            {
                warn!("Driver did not exit, killing it");
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

const DRIVER_SCRIPT: &str = r#"
const { chromium, firefox, webkit, selectors } = require('playwright');
const fs = require('fs');
const path = require('path');
const readline = require('readline');

const engines = { chromium, firefox, webkit };

function send(reply, done) {
  process.stdout.write(JSON.stringify(reply) + '\n', done);
}

function matcher(m) {
  if (Object.prototype.hasOwnProperty.call(m, 'exact')) {
    return { value: m.exact, exact: true };
  }
  return { value: new RegExp(m.pattern, 'i'), exact: false };
}

function build(root, spec) {
  switch (spec.kind) {
    case 'role': {
      if (!spec.name) return root.getByRole(spec.role);
      const m = matcher(spec.name);
      return root.getByRole(spec.role, { name: m.value, exact: m.exact });
    }
    case 'text': {
      const m = matcher(spec.text);
      return root.getByText(m.value, { exact: m.exact });
    }
    case 'test_id':
      return root.getByTestId(spec.id);
    case 'placeholder': {
      const m = matcher(spec.text);
      return root.getByPlaceholder(m.value, { exact: m.exact });
    }
    case 'css':
      return root.locator(spec.selector);
    case 'within':
      return build(build(root, spec.scope), spec.inner);
    case 'first':
      return build(root, spec.inner).first();
    case 'or':
      return spec.options.map((o) => build(root, o)).reduce((a, b) => a.or(b));
    default:
      throw new Error(`unknown locator kind: ${spec.kind}`);
  }
}

function classify(error) {
  const message = String((error && error.message) || error);
  if (/intercepts pointer events/.test(message)) return 'intercepted';
  if (error && error.name === 'TimeoutError') return 'timeout';
  if (/resolved to 0 elements|no element|not found/i.test(message)) return 'not_found';
  return 'driver';
}

(async () => {
  let browser;
  try {
    selectors.setTestIdAttribute(settings.test_id_attribute);
    browser = await engines[settings.browser].launch({ headless: settings.headless });
    const context = await browser.newContext({
      viewport: settings.viewport,
      storageState: settings.storage_state || undefined,
    });
    context.setDefaultTimeout(settings.action_timeout_ms);
    context.setDefaultNavigationTimeout(settings.navigation_timeout_ms);
    const page = await context.newPage();

    const handle = async (cmd) => {
      const target = () => build(page, cmd.locator);
      switch (cmd.op) {
        case 'goto': await page.goto(cmd.url); return null;
        case 'click': await target().click(); return null;
        case 'fill': await target().fill(cmd.value); return null;
        case 'select_option': await target().selectOption(cmd.value); return null;
        case 'check': await target().check(); return null;
        case 'is_visible': return await target().isVisible();
        case 'wait_for':
          await target().waitFor({ state: cmd.state, timeout: cmd.timeout_ms });
          return null;
        case 'count': return await target().count();
        case 'url': return page.url();
        case 'title': return await page.title();
        case 'storage_state':
          fs.mkdirSync(path.dirname(cmd.path), { recursive: true });
          await context.storageState({ path: cmd.path });
          return null;
        case 'clear_cookies':
          await context.clearCookies();
          await context.clearPermissions();
          return null;
        case 'close': await browser.close(); return null;
        default: throw new Error(`unknown op: ${cmd.op}`);
      }
    };

    const rl = readline.createInterface({ input: process.stdin });
    rl.on('line', (line) => {
      let cmd;
      try {
        cmd = JSON.parse(line);
      } catch (error) {
        return;
      }
      handle(cmd).then(
        (value) => {
          const reply = { id: cmd.id, ok: true, value: value === undefined ? null : value };
          if (cmd.op === 'close') {
            send(reply, () => process.exit(0));
          } else {
            send(reply);
          }
        },
        (error) => send({
          id: cmd.id,
          ok: false,
          error: { kind: classify(error), message: String((error && error.message) || error) },
        }),
      );
    });
    rl.on('close', async () => {
      await browser.close().catch(() => {});
      process.exit(0);
    });

    send({ id: 0, ok: true, value: 'ready' });
  } catch (error) {
    if (browser) await browser.close().catch(() => {});
    send(
      { id: 0, ok: false, error: { kind: 'driver', message: String((error && error.message) || error) } },
      () => process.exit(1),
    );
  }
})();
"#;

/// Build the driver script for the given JSON settings
pub fn build_driver_script(settings_json: &str) -> String {
    format!("const settings = {settings_json};\n{DRIVER_SCRIPT}")
}
