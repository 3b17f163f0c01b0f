//! Testing utilities: a scripted in-memory browser.
//!
//! `MockEngine` serves HTML from a route table instead of the network, so
//! the crawler, extractor, session pool and orchestrator can be exercised
//! without a real browser. Every launch, page open/close, click and cookie
//! injection is recorded for assertions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{
    BrowserEngine, BrowserPage, BrowserSession, ControlSelector, ControlState, SessionProfile,
};
use crate::cookies::Cookie;
use crate::error::{BrowserError, BrowserResult};

/// Body served while the site's session-invalid interstitial is scripted.
pub const INTERSTITIAL_HTML: &str =
    "<html><body><h1>Transaction cannot be completed</h1><p>Please try again.</p></body></html>";

type PageFn = dyn Fn(usize) -> Option<String> + Send + Sync;

/// HTML served for one URL. Clicking a clickable control moves to the next
/// page in the sequence; on the last page clicks leave the page unchanged.
#[derive(Clone)]
pub struct MockRoute {
    pages: Arc<PageFn>,
}

impl MockRoute {
    /// A single document.
    pub fn html(html: impl Into<String>) -> Self {
        Self::pages(vec![html.into()])
    }

    /// A paginated sequence of documents.
    pub fn pages(pages: Vec<String>) -> Self {
        Self {
            pages: Arc::new(move |i| pages.get(i).cloned()),
        }
    }

    /// Pages produced on demand; `None` ends the sequence.
    pub fn generated(f: impl Fn(usize) -> Option<String> + Send + Sync + 'static) -> Self {
        Self { pages: Arc::new(f) }
    }

    fn page(&self, index: usize) -> Option<String> {
        (self.pages)(index)
    }
}

/// Record of a call made against the mock browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBrowserCall {
    Launch { session: usize },
    Goto { session: usize, url: String },
    Reload { session: usize, url: String },
    Click { session: usize, control: String },
    AwaitNavigation { session: usize },
}

#[derive(Default)]
struct MockSite {
    routes: RwLock<HashMap<String, MockRoute>>,
    failing: RwLock<HashSet<String>>,
    /// Loads that still show the interstitial, per URL
    interstitials: RwLock<HashMap<String, usize>>,
    site_cookies: RwLock<Vec<Cookie>>,
    calls: RwLock<Vec<MockBrowserCall>>,
    launches: AtomicUsize,
    sessions_closed: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
}

impl MockSite {
    fn record(&self, call: MockBrowserCall) {
        self.calls.write().unwrap().push(call);
    }

    /// Resolve a load of `url`, consuming one scripted interstitial if any.
    fn load(&self, url: &str) -> BrowserResult<Option<MockRoute>> {
        if self.failing.read().unwrap().contains(url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        let mut interstitials = self.interstitials.write().unwrap();
        if let Some(remaining) = interstitials.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        drop(interstitials);

        match self.routes.read().unwrap().get(url) {
            Some(route) => Ok(Some(route.clone())),
            None => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            }),
        }
    }
}

/// Scripted browser engine.
#[derive(Clone, Default)]
pub struct MockEngine {
    site: Arc<MockSite>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `route` at `url`.
    pub fn with_route(self, url: impl Into<String>, route: MockRoute) -> Self {
        self.site.routes.write().unwrap().insert(url.into(), route);
        self
    }

    /// Serve a single document at `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with_route(url, MockRoute::html(html))
    }

    /// Navigation to `url` fails.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.site.failing.write().unwrap().insert(url.into());
        self
    }

    /// The first `loads` loads of `url` show the session-invalid interstitial.
    pub fn with_interstitial(self, url: impl Into<String>, loads: usize) -> Self {
        self.site
            .interstitials
            .write()
            .unwrap()
            .insert(url.into(), loads);
        self
    }

    /// Cookies the site sets on any successful navigation.
    pub fn with_site_cookies(self, cookies: Vec<Cookie>) -> Self {
        *self.site.site_cookies.write().unwrap() = cookies;
        self
    }

    pub fn calls(&self) -> Vec<MockBrowserCall> {
        self.site.calls.read().unwrap().clone()
    }

    /// URLs navigated to, in call order.
    pub fn visited(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockBrowserCall::Goto { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn click_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockBrowserCall::Click { .. }))
            .count()
    }

    pub fn launch_count(&self) -> usize {
        self.site.launches.load(Ordering::SeqCst)
    }

    /// Sessions launched and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.launch_count() - self.site.sessions_closed.load(Ordering::SeqCst)
    }

    /// Pages opened and not yet closed.
    pub fn open_pages(&self) -> usize {
        self.site.pages_opened.load(Ordering::SeqCst)
            - self.site.pages_closed.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.site.pages_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for MockEngine {
    type Session = MockSession;

    async fn launch(&self, _profile: &SessionProfile) -> BrowserResult<MockSession> {
        let id = self.site.launches.fetch_add(1, Ordering::SeqCst);
        self.site.record(MockBrowserCall::Launch { session: id });
        Ok(MockSession {
            id,
            site: Arc::clone(&self.site),
            jar: Arc::new(RwLock::new(Vec::new())),
            injected: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }
}

/// Session handed out by [`MockEngine`].
pub struct MockSession {
    id: usize,
    site: Arc<MockSite>,
    jar: Arc<RwLock<Vec<Cookie>>>,
    injected: RwLock<Vec<Cookie>>,
    closed: AtomicBool,
}

impl MockSession {
    /// Launch sequence number, unique per engine.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every cookie passed to `add_cookies`, in order.
    pub fn injected_cookies(&self) -> Vec<Cookie> {
        self.injected.read().unwrap().clone()
    }

    fn ensure_open(&self) -> BrowserResult<()> {
        if self.is_closed() {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    type Page = MockPage;

    async fn add_cookies(&self, cookies: &[Cookie]) -> BrowserResult<()> {
        self.ensure_open()?;
        self.injected.write().unwrap().extend_from_slice(cookies);
        merge_cookies(&mut self.jar.write().unwrap(), cookies);
        Ok(())
    }

    async fn clear_cookies(&self) -> BrowserResult<()> {
        self.ensure_open()?;
        self.jar.write().unwrap().clear();
        Ok(())
    }

    async fn cookies(&self) -> BrowserResult<Vec<Cookie>> {
        self.ensure_open()?;
        Ok(self.jar.read().unwrap().clone())
    }

    async fn new_page(&self) -> BrowserResult<MockPage> {
        self.ensure_open()?;
        self.site.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage {
            session: self.id,
            site: Arc::clone(&self.site),
            jar: Arc::clone(&self.jar),
            state: RwLock::new(PageState::default()),
            closed: AtomicBool::new(false),
        })
    }

    async fn close(&self) -> BrowserResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.site.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn merge_cookies(jar: &mut Vec<Cookie>, cookies: &[Cookie]) {
    for cookie in cookies {
        jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
        jar.push(cookie.clone());
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    route: Option<MockRoute>,
    index: usize,
    html: String,
}

/// Page handed out by [`MockSession`].
pub struct MockPage {
    session: usize,
    site: Arc<MockSite>,
    jar: Arc<RwLock<Vec<Cookie>>>,
    state: RwLock<PageState>,
    closed: AtomicBool,
}

impl MockPage {
    fn ensure_open(&self) -> BrowserResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    fn load(&self, url: &str) -> BrowserResult<()> {
        let route = self.site.load(url)?;
        let html = match &route {
            Some(route) => route.page(0).unwrap_or_default(),
            None => INTERSTITIAL_HTML.to_string(),
        };
        *self.state.write().unwrap() = PageState {
            url: url.to_string(),
            route,
            index: 0,
            html,
        };
        let site_cookies = self.site.site_cookies.read().unwrap().clone();
        merge_cookies(&mut self.jar.write().unwrap(), &site_cookies);
        Ok(())
    }

    fn html(&self) -> String {
        self.state.read().unwrap().html.clone()
    }
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        self.site.record(MockBrowserCall::Goto {
            session: self.session,
            url: url.to_string(),
        });
        self.load(url)
    }

    async fn reload(&self, _timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let url = self.state.read().unwrap().url.clone();
        self.site.record(MockBrowserCall::Reload {
            session: self.session,
            url: url.clone(),
        });
        self.load(&url)
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        self.site.record(MockBrowserCall::AwaitNavigation {
            session: self.session,
        });
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let selector = Selector::parse(selector)
            .map_err(|e| BrowserError::NotFound(format!("bad selector {selector}: {e:?}")))?;
        if Html::parse_document(&self.html()).select(&selector).next().is_some() {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: "selector".to_string(),
                timeout,
            })
        }
    }

    async fn wait_for_text(&self, text: &str, timeout: Duration) -> BrowserResult<()> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.html());
        let body: String = document.root_element().text().collect();
        if body.contains(text) {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: format!("text {text:?}"),
                timeout,
            })
        }
    }

    async fn content(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.html())
    }

    async fn url(&self) -> BrowserResult<String> {
        self.ensure_open()?;
        Ok(self.state.read().unwrap().url.clone())
    }

    async fn find_control(
        &self,
        control: &ControlSelector,
    ) -> BrowserResult<Option<ControlState>> {
        self.ensure_open()?;
        let document = Html::parse_document(&self.html());
        Ok(locate(&document, control).map(|el| control_state(&el)))
    }

    async fn click_control(&self, control: &ControlSelector) -> BrowserResult<()> {
        self.ensure_open()?;
        self.site.record(MockBrowserCall::Click {
            session: self.session,
            control: control.to_string(),
        });

        let document = Html::parse_document(&self.html());
        let state = locate(&document, control)
            .map(|el| control_state(&el))
            .ok_or_else(|| BrowserError::NotFound(control.to_string()))?;
        if !state.clickable() {
            return Err(BrowserError::NotFound(format!("{control} is not clickable")));
        }

        let mut page = self.state.write().unwrap();
        let next = page.index + 1;
        if let Some(html) = page.route.as_ref().and_then(|r| r.page(next)) {
            page.index = next;
            page.html = html;
        }
        Ok(())
    }

    async fn close(&self) -> BrowserResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.site.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn locate<'a>(document: &'a Html, control: &ControlSelector) -> Option<ElementRef<'a>> {
    match control {
        ControlSelector::Css(css) => {
            let selector = Selector::parse(css).ok()?;
            document.select(&selector).next()
        }
        ControlSelector::Text { tag, text } => {
            let selector = Selector::parse(tag).ok()?;
            document
                .select(&selector)
                .find(|el| el.text().collect::<String>().trim().contains(*text))
        }
    }
}

fn control_state(el: &ElementRef<'_>) -> ControlState {
    let attrs = el.value();
    let style = attrs
        .attr("style")
        .unwrap_or_default()
        .replace(' ', "")
        .to_lowercase();
    let visible = attrs.attr("hidden").is_none() && !style.contains("display:none");
    let disabled = attrs.attr("disabled").is_some()
        || attrs.attr("aria-disabled") == Some("true")
        || attrs.classes().any(|c| c.eq_ignore_ascii_case("disabled"));
    ControlState { visible, disabled }
}
