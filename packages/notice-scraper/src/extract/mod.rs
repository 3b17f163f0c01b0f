//! Detail page extraction.
//!
//! A detail fetch renders the page in the worker's pooled session, then
//! reads every known label through the lookup cascade in [`lookup`]. Any
//! failure yields an empty [`Record`]; missing labels yield empty fields.

pub mod lookup;

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{BrowserEngine, BrowserPage, BrowserSession, SessionPool, WorkerId};
use crate::contact::parse_contact;
use crate::cookies::{CookieRelay, CookieSnapshot};
use crate::error::{BrowserError, BrowserResult};
use crate::http::HttpFallback;
use crate::text::{clean_value, squash_whitespace};
use crate::types::record::Record;

use lookup::{lookup_cascade, LookupStrategy, PageModel, RENDERED_TIERS, STATIC_TIERS};

lazy_static! {
    static ref REF_ID: Regex = Regex::new(r"refID=(\d+)").unwrap();
    static ref MONEY_SYMBOLS: Regex = Regex::new(r"[₱$,]").unwrap();
}

/// Labels read from every detail page, in lookup order.
pub const FIELD_LABELS: [&str; 19] = [
    "Reference Number",
    "Procuring Entity",
    "Title",
    "Area of Delivery",
    "Solicitation Number",
    "Procurement Mode",
    "Classification",
    "Category",
    "Approved Budget for the Contract",
    "Delivery Period",
    "Status",
    "Date Published",
    "Closing Date / Time",
    "Last Updated / Time",
    "Contact Person",
    "Office/Address",
    "Address",
    "Email Address",
    "Telephone Number",
];

/// Labels whose appearance means the detail table has rendered.
pub const KNOWN_LABELS: [&str; 4] = [
    "Reference Number",
    "Procuring Entity",
    "Approved Budget for the Contract",
    "Closing Date / Time",
];

/// Text of the site's "session invalid" interstitial.
pub const INTERSTITIAL_TEXT: &str = "Transaction cannot be completed";

/// Timeouts for one detail fetch.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub goto_timeout: Duration,
    pub idle_timeout: Duration,
    /// Per known label
    pub label_timeout: Duration,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            goto_timeout: Duration::from_secs(90),
            idle_timeout: Duration::from_secs(30),
            label_timeout: Duration::from_secs(5),
        }
    }
}

/// Turns detail URLs into records using the worker's pooled session.
pub struct DetailExtractor<E: BrowserEngine> {
    pool: Arc<SessionPool<E>>,
    relay: Arc<CookieRelay>,
    http: Option<Arc<HttpFallback>>,
    settings: ExtractSettings,
}

impl<E: BrowserEngine> DetailExtractor<E> {
    pub fn new(pool: Arc<SessionPool<E>>, relay: Arc<CookieRelay>) -> Self {
        Self {
            pool,
            relay,
            http: None,
            settings: ExtractSettings::default(),
        }
    }

    /// Fall back to a plain HTTP fetch when the browser fails.
    pub fn with_http_fallback(mut self, http: Arc<HttpFallback>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_settings(mut self, settings: ExtractSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Scrape one detail page. Never fails: errors yield an empty record.
    pub async fn parse_detail(&self, worker: WorkerId, url: &str) -> Record {
        let cookies = self.relay.read();
        if let Some(http) = &self.http {
            http.sync_cookies(&cookies);
        }

        match self.render(worker, url, &cookies).await {
            Ok(html) => record_from_html(url, &html, RENDERED_TIERS),
            Err(e) => {
                warn!(url = %url, %worker, error = %e, "Detail page failed");
                self.fetch_over_http(url).await
            }
        }
    }

    async fn render(
        &self,
        worker: WorkerId,
        url: &str,
        cookies: &CookieSnapshot,
    ) -> BrowserResult<String> {
        let session = self.pool.acquire(worker, cookies).await?;
        let page = session.new_page().await?;

        let result = self.load(&page, url).await;

        // The session stays open for this worker's next URL
        if let Err(e) = page.close().await {
            debug!(url = %url, error = %e, "Failed to close detail page");
        }
        result
    }

    async fn load<P: BrowserPage>(&self, page: &P, url: &str) -> BrowserResult<String> {
        page.goto(url, self.settings.goto_timeout).await?;
        self.settle(page).await;

        let html = page.content().await?;
        if !html.contains(INTERSTITIAL_TEXT) {
            return Ok(html);
        }

        debug!(url = %url, "Session-invalid page, reloading once");
        page.reload(self.settings.goto_timeout).await?;
        self.settle(page).await;

        let html = page.content().await?;
        if html.contains(INTERSTITIAL_TEXT) {
            return Err(BrowserError::SessionInvalid {
                url: url.to_string(),
            });
        }
        Ok(html)
    }

    /// Wait for network quiescence, then for the first known label.
    async fn settle<P: BrowserPage>(&self, page: &P) {
        if let Err(e) = page.wait_for_network_idle(self.settings.idle_timeout).await {
            debug!(error = %e, "Network did not go idle");
        }
        for label in KNOWN_LABELS {
            if page
                .wait_for_text(label, self.settings.label_timeout)
                .await
                .is_ok()
            {
                return;
            }
        }
        debug!("No known label appeared");
    }

    async fn fetch_over_http(&self, url: &str) -> Record {
        let Some(http) = &self.http else {
            return Record::default();
        };
        match http.fetch(url).await {
            Ok(html) => record_from_html(url, &html, &[]),
            Err(e) => {
                warn!(url = %url, error = %e, "HTTP fallback failed");
                Record::default()
            }
        }
    }
}

/// Values found by the rendered tiers, keyed by label.
struct FieldTable {
    entries: Vec<(&'static str, Option<String>)>,
}

impl FieldTable {
    fn build(page: &PageModel, tiers: &[LookupStrategy]) -> Self {
        let entries = if tiers.is_empty() {
            vec![]
        } else {
            FIELD_LABELS
                .iter()
                .map(|label| (*label, lookup_cascade(page, label, tiers)))
                .collect()
        };
        Self { entries }
    }

    /// First table value whose label contains `label`, else the static
    /// tiers. "Address" therefore prefers the Office/Address value.
    fn find(&self, page: &PageModel, label: &str) -> Option<String> {
        let needle = label.to_lowercase();
        self.entries
            .iter()
            .find_map(|(key, value)| {
                value
                    .as_ref()
                    .filter(|_| key.to_lowercase().contains(&needle))
                    .cloned()
            })
            .or_else(|| lookup_cascade(page, label, STATIC_TIERS))
    }
}

/// Build a record from detail page HTML.
///
/// `tiers` are tried before the static fallback; pass an empty slice for
/// HTML that was not rendered by the browser.
pub fn record_from_html(url: &str, html: &str, tiers: &[LookupStrategy]) -> Record {
    let page = PageModel::parse(html);
    let table = FieldTable::build(&page, tiers);
    let field = |label: &str| clean_value(table.find(&page, label).as_deref());

    let raw_contact = field("Contact Person");
    let contact = raw_contact
        .as_deref()
        .map(parse_contact)
        .unwrap_or_default();

    Record {
        ref_id: ref_id_from_url(url),
        url: Some(url.to_string()),
        reference_number: field("Reference Number"),
        procuring_entity: field("Procuring Entity"),
        title: field("Title"),
        area_of_delivery: field("Area of Delivery"),
        solicitation_number: field("Solicitation Number"),
        procurement_mode: field("Procurement Mode"),
        classification: field("Classification"),
        category: field("Category"),
        abc_php: table
            .find(&page, "Approved Budget for the Contract")
            .and_then(|raw| strip_money(&raw)),
        delivery_period: field("Delivery Period"),
        status: field("Status"),
        date_published: field("Date Published"),
        closing_datetime: field("Closing Date / Time"),
        last_updated: field("Last Updated / Time"),
        contact_person: contact.name.or(raw_contact),
        contact_position: contact.position,
        contact_address: contact
            .address
            .or_else(|| field("Office/Address"))
            .or_else(|| field("Address")),
        contact_email: contact.email.or_else(|| field("Email Address")),
        contact_phone: contact.phone.or_else(|| field("Telephone Number")),
    }
}

/// Digits of the `refID` query parameter.
pub fn ref_id_from_url(url: &str) -> Option<String> {
    REF_ID.captures(url).map(|cap| cap[1].to_string())
}

/// Drop currency symbols and thousands separators, collapse whitespace.
fn strip_money(raw: &str) -> Option<String> {
    let stripped = squash_whitespace(&MONEY_SYMBOLS.replace_all(raw, ""));
    (!stripped.is_empty()).then_some(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str =
        "https://notices.philgeps.gov.ph/GEPSNONPILOT/Tender/SplashBidNoticeAbstractUI.aspx?menuIndex=3&refID=11223344&Result=3";

    fn detail_html() -> String {
        r#"<html><body>
        <table>
          <tr><td><span>Reference Number</span></td><td>11223344</td></tr>
          <tr><td><span>Procuring Entity</span></td><td>CITY GOVERNMENT OF PASIG</td></tr>
          <tr><td><span>Title</span></td><td>Printing of Forms Printable Version</td></tr>
          <tr><td><span>Area of Delivery</span></td><td>Metro Manila</td></tr>
          <tr><td><span>Approved Budget for the Contract</span></td><td>₱ 55,200.00</td></tr>
          <tr><td><span>Closing Date / Time</span></td><td>15/03/2024 10:00 AM</td></tr>
          <tr><td><span>Contact Person</span></td><td>Maria Santos<br>BAC Secretariat Head<br>Caruncho Ave, Pasig City<br>maria@pasig.gov.ph<br>02-8643-1111</td></tr>
          <tr><td><span>Office/Address</span></td><td>Pasig City Hall</td></tr>
        </table>
        <p>The PhilGEPS Team is not responsible for any typographical errors.</p>
        </body></html>"#
            .to_string()
    }

    #[test]
    fn test_ref_id_from_url() {
        assert_eq!(ref_id_from_url(URL).as_deref(), Some("11223344"));
        assert_eq!(ref_id_from_url("https://example.test/?id=1"), None);
    }

    #[test]
    fn test_strip_money() {
        assert_eq!(strip_money("₱ 55,200.00").as_deref(), Some("55200.00"));
        assert_eq!(strip_money("$ ,"), None);
    }

    #[test]
    fn test_record_from_rendered_html() {
        let record = record_from_html(URL, &detail_html(), RENDERED_TIERS);

        assert_eq!(record.ref_id.as_deref(), Some("11223344"));
        assert_eq!(record.url.as_deref(), Some(URL));
        assert_eq!(record.reference_number.as_deref(), Some("11223344"));
        assert_eq!(
            record.procuring_entity.as_deref(),
            Some("CITY GOVERNMENT OF PASIG")
        );
        assert_eq!(record.title.as_deref(), Some("Printing of Forms"));
        assert_eq!(record.abc_php.as_deref(), Some("55200.00"));
        assert_eq!(
            record.closing_datetime.as_deref(),
            Some("15/03/2024 10:00 AM")
        );
        assert_eq!(record.contact_person.as_deref(), Some("Maria Santos"));
        assert_eq!(
            record.contact_position.as_deref(),
            Some("BAC Secretariat Head")
        );
        assert_eq!(record.contact_email.as_deref(), Some("maria@pasig.gov.ph"));
        assert_eq!(record.contact_phone.as_deref(), Some("02-8643-1111"));
        assert_eq!(record.status, None);
    }

    #[test]
    fn test_address_prefers_office_address() {
        let html = r#"<table>
            <tr><td><span>Contact Person</span></td><td>Jose Rizal</td></tr>
            <tr><td><span>Office/Address</span></td><td>Pasig City Hall</td></tr>
            <tr><td><span>Address</span></td><td>Somewhere Else</td></tr>
        </table>"#;
        let record = record_from_html(URL, html, RENDERED_TIERS);
        assert_eq!(record.contact_person.as_deref(), Some("Jose Rizal"));
        assert_eq!(record.contact_address.as_deref(), Some("Pasig City Hall"));
    }

    #[test]
    fn test_static_only_record() {
        let html = r#"<table>
            <tr><th>Procuring Entity</th><td>DEPED REGION IV-A</td></tr>
            <tr><th>Status</th><td>Active</td></tr>
        </table>"#;
        let record = record_from_html(URL, html, &[]);
        assert_eq!(record.procuring_entity.as_deref(), Some("DEPED REGION IV-A"));
        assert_eq!(record.status.as_deref(), Some("Active"));
    }
}
