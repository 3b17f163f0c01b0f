//! Browser engine abstraction.
//!
//! Three layers, each owned by the one above: an engine launches sessions,
//! a session opens pages. The listing crawler and detail extractor only see
//! these traits; the Chromium implementation lives behind the `chromium`
//! feature and the `testing` module provides scripted mocks.

pub mod pool;

#[cfg(feature = "chromium")]
pub mod chromium;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::cookies::Cookie;
use crate::error::BrowserResult;

pub use pool::SessionPool;

/// Identity of one detail worker. Keys the session pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Hides the most common automation fingerprint before any page script runs.
pub const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Desktop Chrome user agent for the host platform, so the reported OS
/// matches the browser's other fingerprints.
pub fn platform_user_agent(os: &str) -> String {
    let platform = match os {
        "windows" => "Windows NT 10.0; Win64; x64",
        "macos" => "Macintosh; Intel Mac OS X 10_15_7",
        _ => "X11; Linux x86_64",
    };
    format!(
        "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/122.0.0.0 Safari/537.36"
    )
}

/// Client identity applied to every session at launch.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Injected into every new document
    pub init_script: Option<String>,
    pub ignore_https_errors: bool,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            user_agent: platform_user_agent(std::env::consts::OS),
            viewport_width: 1366,
            viewport_height: 768,
            init_script: Some(STEALTH_SCRIPT.to_string()),
            ignore_https_errors: true,
        }
    }
}

impl SessionProfile {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }
}

/// A clickable control located by CSS or by its visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSelector {
    Css(&'static str),
    /// Element of `tag` whose trimmed text equals `text`
    Text {
        tag: &'static str,
        text: &'static str,
    },
}

impl fmt::Display for ControlSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Text { tag, text } => write!(f, "{tag}:text(\"{text}\")"),
        }
    }
}

/// Observable state of a located control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub visible: bool,
    pub disabled: bool,
}

impl ControlState {
    pub fn clickable(&self) -> bool {
        self.visible && !self.disabled
    }
}

/// Launches isolated browser sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync + 'static {
    type Session: BrowserSession;

    /// Start a new session configured with `profile`.
    async fn launch(&self, profile: &SessionProfile) -> BrowserResult<Self::Session>;
}

/// One cookie-bearing browsing context.
#[async_trait]
pub trait BrowserSession: Send + Sync + 'static {
    type Page: BrowserPage;

    async fn add_cookies(&self, cookies: &[Cookie]) -> BrowserResult<()>;

    async fn clear_cookies(&self) -> BrowserResult<()>;

    async fn cookies(&self) -> BrowserResult<Vec<Cookie>>;

    async fn new_page(&self) -> BrowserResult<Self::Page>;

    /// Close every page, the context and the engine process.
    async fn close(&self) -> BrowserResult<()>;
}

/// One tab within a session.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

    async fn reload(&self, timeout: Duration) -> BrowserResult<()>;

    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Wait until `text` appears anywhere in the rendered body.
    async fn wait_for_text(&self, text: &str, timeout: Duration) -> BrowserResult<()>;

    /// Rendered document HTML.
    async fn content(&self) -> BrowserResult<String>;

    /// Current document URL.
    async fn url(&self) -> BrowserResult<String>;

    /// Locate a control. `None` when nothing matches.
    async fn find_control(&self, control: &ControlSelector)
        -> BrowserResult<Option<ControlState>>;

    async fn click_control(&self, control: &ControlSelector) -> BrowserResult<()>;

    /// Wait until the document replaced by the last click has finished
    /// loading. The pre-click document never satisfies this.
    async fn wait_for_navigation(&self, timeout: Duration) -> BrowserResult<()>;

    async fn close(&self) -> BrowserResult<()>;
}
