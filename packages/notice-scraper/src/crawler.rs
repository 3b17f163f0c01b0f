//! Paginated listing crawl for one category.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{
    BrowserEngine, BrowserPage, BrowserSession, ControlSelector, ControlState, SessionProfile,
};
use crate::cookies::CookieRelay;
use crate::error::{FetchResult, ScrapeError};
use crate::types::category::BASE_URL;

/// Anchors that lead to a notice detail page.
pub const DETAIL_LINK_SELECTOR: &str = "a[href*='SplashBidNoticeAbstractUI.aspx']";

/// "Next page" controls, most specific first.
pub const NEXT_CONTROLS: &[ControlSelector] = &[
    ControlSelector::Css("a#pgCtrlDetailedSearch_nextLB"),
    ControlSelector::Css(r#"a[id*="next"]"#),
    ControlSelector::Css(r#"a[onclick*="next"]"#),
    ControlSelector::Text { tag: "a", text: "Next" },
    ControlSelector::Text { tag: "a", text: ">" },
    ControlSelector::Text { tag: "a", text: ">>" },
    ControlSelector::Css(r#"input[value*="Next"]"#),
    ControlSelector::Css(r#"input[value*=">"]"#),
];

lazy_static! {
    static ref DETAIL_LINK: Selector = Selector::parse(DETAIL_LINK_SELECTOR).unwrap();
}

/// Timeouts, pauses and the page cap for one listing crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub max_pages: usize,
    pub prime_timeout: Duration,
    pub listing_timeout: Duration,
    pub idle_timeout: Duration,
    pub selector_timeout: Duration,
    /// Wait for the next page to load after clicking "next"
    pub click_idle_timeout: Duration,
    /// Pause after the priming page
    pub prime_settle: Duration,
    /// Pause before reading each page
    pub page_settle: Duration,
    /// Pause after clicking "next"
    pub click_settle: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_pages: 100,
            prime_timeout: Duration::from_secs(60),
            listing_timeout: Duration::from_secs(90),
            idle_timeout: Duration::from_secs(15),
            selector_timeout: Duration::from_secs(30),
            click_idle_timeout: Duration::from_secs(30),
            prime_settle: Duration::from_secs(3),
            page_settle: Duration::from_millis(1500),
            click_settle: Duration::from_secs(2),
        }
    }
}

impl CrawlSettings {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Drop every fixed pause. Timeouts are kept.
    pub fn without_delays(mut self) -> Self {
        self.prime_settle = Duration::ZERO;
        self.page_settle = Duration::ZERO;
        self.click_settle = Duration::ZERO;
        self
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoNewLinks,
    NoNextControl,
    ControlUnavailable,
    ClickFailed,
    PageCap,
}

/// Walks a category listing in a fresh session and collects detail URLs.
pub struct ListingCrawler<E: BrowserEngine> {
    engine: Arc<E>,
    relay: Arc<CookieRelay>,
    profile: SessionProfile,
    settings: CrawlSettings,
}

impl<E: BrowserEngine> ListingCrawler<E> {
    pub fn new(engine: Arc<E>, relay: Arc<CookieRelay>) -> Self {
        Self {
            engine,
            relay,
            profile: SessionProfile::default(),
            settings: CrawlSettings::default(),
        }
    }

    pub fn with_profile(mut self, profile: SessionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Unique detail URLs in discovery order.
    ///
    /// Publishes the session's cookies to the relay once pagination ends.
    /// Returns an empty list when the listing never rendered.
    pub async fn collect_detail_links(&self, category_url: &str) -> Vec<String> {
        let base = match Url::parse(category_url) {
            Ok(base) => base,
            Err(_) => {
                warn!(url = %category_url, "Invalid listing URL");
                return vec![];
            }
        };

        let session = match self.engine.launch(&self.profile).await {
            Ok(session) => session,
            Err(e) => {
                warn!(url = %category_url, error = %e, "Could not start listing session");
                return vec![];
            }
        };

        let links = match self.open_listing(&session, category_url).await {
            Ok(page) => {
                let (links, reason) = self.paginate(&page, &base).await;
                info!(url = %category_url, links = links.len(), ?reason, "Pagination finished");
                if let Err(e) = page.close().await {
                    warn!(error = %e, "Failed to close listing page");
                }

                match session.cookies().await {
                    Ok(cookies) => self.relay.publish(cookies),
                    Err(e) => warn!(error = %e, "Could not read listing session cookies"),
                }
                links
            }
            Err(e) => {
                warn!(url = %category_url, error = %e, "Listing did not render");
                vec![]
            }
        };

        if let Err(e) = session.close().await {
            debug!(error = %e, "Failed to close listing session");
        }
        links
    }

    async fn open_listing(
        &self,
        session: &E::Session,
        category_url: &str,
    ) -> FetchResult<<E::Session as BrowserSession>::Page> {
        if let Err(e) = session.clear_cookies().await {
            debug!(error = %e, "Could not clear cookies");
        }
        let page = session.new_page().await?;

        debug!(url = BASE_URL, "Priming session");
        page.goto(BASE_URL, self.settings.prime_timeout).await?;
        tokio::time::sleep(self.settings.prime_settle).await;

        debug!(url = %category_url, "Opening listing");
        page.goto(category_url, self.settings.listing_timeout).await?;
        if let Err(e) = page.wait_for_network_idle(self.settings.idle_timeout).await {
            debug!(error = %e, "Listing network did not go idle");
        }
        page.wait_for_selector(DETAIL_LINK_SELECTOR, self.settings.selector_timeout)
            .await
            .map_err(|_| ScrapeError::ListingNotRendered {
                url: category_url.to_string(),
            })?;
        Ok(page)
    }

    async fn paginate<P: BrowserPage>(&self, page: &P, base: &Url) -> (Vec<String>, StopReason) {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for page_no in 1..=self.settings.max_pages {
            tokio::time::sleep(self.settings.page_settle).await;

            match page.content().await {
                Ok(html) => {
                    let fresh = new_detail_links(&html, base, &mut seen);
                    debug!(page = page_no, new_links = fresh.len(), "Collected listing page");
                    if fresh.is_empty() && page_no > 1 {
                        return (links, StopReason::NoNewLinks);
                    }
                    links.extend(fresh);
                }
                Err(e) => warn!(page = page_no, error = %e, "Could not read listing page"),
            }

            let Some((control, state)) = find_next_control(page).await else {
                return (links, StopReason::NoNextControl);
            };
            if !state.clickable() {
                debug!(%control, ?state, "Next control unavailable");
                return (links, StopReason::ControlUnavailable);
            }
            if let Err(e) = page.click_control(&control).await {
                warn!(%control, error = %e, "Could not click next control");
                return (links, StopReason::ClickFailed);
            }
            if let Err(e) = page
                .wait_for_navigation(self.settings.click_idle_timeout)
                .await
            {
                debug!(error = %e, "No navigation finished after click");
            }
            tokio::time::sleep(self.settings.click_settle).await;
        }

        info!(max_pages = self.settings.max_pages, "Reached page cap");
        (links, StopReason::PageCap)
    }
}

/// First candidate present on the page, with its state.
async fn find_next_control<P: BrowserPage>(page: &P) -> Option<(ControlSelector, ControlState)> {
    for control in NEXT_CONTROLS {
        match page.find_control(control).await {
            Ok(Some(state)) => return Some((*control, state)),
            Ok(None) => continue,
            Err(e) => debug!(%control, error = %e, "Control lookup failed"),
        }
    }
    None
}

/// Detail links on `html` not already in `seen`, resolved against `base`.
fn new_detail_links(html: &str, base: &Url, seen: &mut HashSet<String>) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&DETAIL_LINK)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_detail_links_dedups_and_resolves() {
        let base = Url::parse(
            "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashOpportunitiesSearchUI.aspx?BusCatID=29",
        )
        .unwrap();
        let html = r#"
            <a href="SplashBidNoticeAbstractUI.aspx?refID=1">one</a>
            <a href="SplashBidNoticeAbstractUI.aspx?refID=2">two</a>
            <a href="SplashBidNoticeAbstractUI.aspx?refID=1">one again</a>
            <a href="/Other.aspx">other</a>"#;

        let mut seen = HashSet::new();
        let links = new_detail_links(html, &base, &mut seen);
        assert_eq!(
            links,
            vec![
                "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashBidNoticeAbstractUI.aspx?refID=1",
                "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashBidNoticeAbstractUI.aspx?refID=2",
            ]
        );

        assert!(new_detail_links(html, &base, &mut seen).is_empty());
    }

    #[test]
    fn test_without_delays_keeps_timeouts() {
        let settings = CrawlSettings::default().without_delays();
        assert_eq!(settings.page_settle, Duration::ZERO);
        assert_eq!(settings.listing_timeout, Duration::from_secs(90));
        assert_eq!(settings.max_pages, 100);
    }
}
