//! Chromium backend over the DevTools protocol.
//!
//! One [`ChromiumSession`] is one browser process with its own profile
//! directory, so sessions never share cookies or cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrowserEngine, BrowserPage, BrowserSession, ControlSelector, ControlState, SessionProfile};
use crate::cookies::Cookie;
use crate::error::{BrowserError, BrowserResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Window property set just before a control is clicked.
const STALE_MARKER: &str = "__noticeStaleDocument";

static PROFILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string().into())
}

/// Launches headless Chromium processes.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
    headful: bool,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this Chrome/Chromium binary instead of auto-detection.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Show the browser window.
    pub fn with_head(mut self, headful: bool) -> Self {
        self.headful = headful;
        self
    }

    fn config(&self, profile: &SessionProfile, data_dir: &Path) -> BrowserResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(data_dir)
            .window_size(profile.viewport_width, profile.viewport_height)
            .viewport(Viewport {
                width: profile.viewport_width,
                height: profile.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");
        if profile.ignore_https_errors {
            builder = builder.arg("--ignore-certificate-errors");
        }
        if self.headful {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    type Session = ChromiumSession;

    async fn launch(&self, profile: &SessionProfile) -> BrowserResult<ChromiumSession> {
        let data_dir = std::env::temp_dir().join(format!(
            "notice-scraper-{}-{}",
            std::process::id(),
            PROFILE_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let config = self.config(profile, &data_dir)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The handler drives the CDP connection and must be polled for the
        // browser to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!(data_dir = %data_dir.display(), "Launched Chromium session");
        Ok(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            handler: std::sync::Mutex::new(Some(handler_task)),
            profile: profile.clone(),
            data_dir,
        })
    }
}

/// One Chromium process.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    profile: SessionProfile,
    data_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Page = ChromiumPage;

    async fn add_cookies(&self, cookies: &[Cookie]) -> BrowserResult<()> {
        let params = cookies
            .iter()
            .map(|c| {
                let mut param = CookieParam::new(c.name.clone(), c.value.clone());
                param.domain = Some(c.domain.clone());
                param.path = Some(c.path.clone());
                param
            })
            .collect::<Vec<_>>();

        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;
        browser.set_cookies(params).await.map_err(protocol)?;
        Ok(())
    }

    async fn clear_cookies(&self) -> BrowserResult<()> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;
        browser.clear_cookies().await.map_err(protocol)?;
        Ok(())
    }

    async fn cookies(&self) -> BrowserResult<Vec<Cookie>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::Closed)?;
        let cookies = browser.get_cookies().await.map_err(protocol)?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie::new(c.name, c.value, c.domain, c.path))
            .collect())
    }

    async fn new_page(&self) -> BrowserResult<ChromiumPage> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(BrowserError::Closed)?;
            browser.new_page("about:blank").await.map_err(protocol)?
        };

        page.set_user_agent(SetUserAgentOverrideParams::new(
            self.profile.user_agent.clone(),
        ))
        .await
        .map_err(protocol)?;
        if let Some(script) = &self.profile.init_script {
            page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                script.clone(),
            ))
            .await
            .map_err(protocol)?;
        }
        Ok(ChromiumPage { page })
    }

    async fn close(&self) -> BrowserResult<()> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Chromium did not close cleanly");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Waiting for Chromium exit failed");
        }

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.data_dir).await {
            debug!(error = %e, dir = %self.data_dir.display(), "Could not remove profile dir");
        }
        Ok(())
    }
}

/// One tab.
pub struct ChromiumPage {
    page: Page,
}

#[derive(Deserialize)]
struct ControlProbe {
    visible: bool,
    disabled: bool,
}

impl ChromiumPage {
    async fn eval_string(&self, js: String) -> BrowserResult<String> {
        self.page
            .evaluate(js)
            .await
            .map_err(protocol)?
            .into_value::<String>()
            .map_err(protocol)
    }

    async fn eval_bool(&self, js: String) -> BrowserResult<bool> {
        self.page
            .evaluate(js)
            .await
            .map_err(protocol)?
            .into_value::<bool>()
            .map_err(protocol)
    }

    /// Poll `check` until it holds or `timeout` passes.
    async fn poll<F, Fut>(&self, what: String, timeout: Duration, mut check: F) -> BrowserResult<()>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = bool> + Send,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if check().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout { what, timeout });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// JS expression evaluating to the element `control` names, or null.
fn locate_js(control: &ControlSelector) -> String {
    match control {
        ControlSelector::Css(css) => {
            format!("document.querySelector({})", json_str(css))
        }
        ControlSelector::Text { tag, text } => format!(
            "Array.from(document.querySelectorAll({})).find(el => el.textContent.trim().includes({})) || null",
            json_str(tag),
            json_str(text)
        ),
    }
}

fn json_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("navigation to {url}"),
                timeout,
            }),
        }
    }

    async fn reload(&self, timeout: Duration) -> BrowserResult<()> {
        match tokio::time::timeout(timeout, self.page.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(protocol(e)),
            Err(_) => Err(BrowserError::Timeout {
                what: "reload".to_string(),
                timeout,
            }),
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()> {
        // No idle event in the protocol; a complete document plus one quiet
        // poll interval is the closest observable state
        self.poll("network idle".to_string(), timeout, || async move {
            self.eval_bool("document.readyState === 'complete'".to_string())
                .await
                .unwrap_or(false)
        })
        .await?;
        tokio::time::sleep(POLL_INTERVAL).await;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let js = format!("document.querySelector({}) !== null", json_str(selector));
        let js = js.as_str();
        self.poll(format!("selector {selector}"), timeout, || async move {
            self.eval_bool(js.to_string()).await.unwrap_or(false)
        })
        .await
    }

    async fn wait_for_text(&self, text: &str, timeout: Duration) -> BrowserResult<()> {
        let js = format!(
            "!!document.body && document.body.innerText.includes({})",
            json_str(text)
        );
        let js = js.as_str();
        self.poll(format!("text {text:?}"), timeout, || async move {
            self.eval_bool(js.to_string()).await.unwrap_or(false)
        })
        .await
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page.content().await.map_err(protocol)
    }

    async fn url(&self) -> BrowserResult<String> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn find_control(&self, control: &ControlSelector) -> BrowserResult<Option<ControlState>> {
        let js = format!(
            r#"(() => {{
                const el = {};
                if (!el) return "null";
                const style = window.getComputedStyle(el);
                const visible = style.display !== "none" && style.visibility !== "hidden"
                    && el.getClientRects().length > 0;
                const disabled = el.disabled === true
                    || el.getAttribute("aria-disabled") === "true"
                    || el.classList.contains("disabled");
                return JSON.stringify({{ visible, disabled }});
            }})()"#,
            locate_js(control)
        );
        let raw = self.eval_string(js).await?;
        let probe: Option<ControlProbe> = serde_json::from_str(&raw).map_err(protocol)?;
        Ok(probe.map(|p| ControlState {
            visible: p.visible,
            disabled: p.disabled,
        }))
    }

    async fn click_control(&self, control: &ControlSelector) -> BrowserResult<()> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return false; window.{STALE_MARKER} = true; el.click(); return true; }})()",
            locate_js(control)
        );
        if self.eval_bool(js).await? {
            Ok(())
        } else {
            Err(BrowserError::NotFound(control.to_string()))
        }
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> BrowserResult<()> {
        // The marker set before the click lives on the old window only
        let js = format!("window.{STALE_MARKER} !== true && document.readyState === 'complete'");
        let js = js.as_str();
        self.poll("navigation after click".to_string(), timeout, || async move {
            self.eval_bool(js.to_string()).await.unwrap_or(false)
        })
        .await?;
        tokio::time::sleep(POLL_INTERVAL).await;
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        self.page.clone().close().await.map_err(protocol)
    }
}
