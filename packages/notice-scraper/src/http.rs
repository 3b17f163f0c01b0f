//! Plain HTTP fetches that share the browser's session cookies.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use tracing::{debug, warn};
use url::Url;

use crate::cookies::CookieSnapshot;
use crate::error::{FetchResult, ScrapeError};
use crate::types::category::BASE_URL;

const DEFAULT_DOMAIN: &str = "notices.philgeps.gov.ph";

/// HTTP client whose cookie jar mirrors the latest relay snapshot.
pub struct HttpFallback {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl HttpFallback {
    pub fn new(user_agent: &str) -> FetchResult<Self> {
        let jar = Arc::new(Jar::default());

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, jar })
    }

    /// Copy every cookie from `snapshot` into the jar.
    pub fn sync_cookies(&self, snapshot: &CookieSnapshot) {
        for cookie in snapshot.cookies() {
            let domain = cookie.domain.trim_start_matches('.');
            let domain = if domain.is_empty() { DEFAULT_DOMAIN } else { domain };
            let path = if cookie.path.is_empty() { "/" } else { &cookie.path };

            let Ok(origin) = Url::parse(&format!("https://{domain}/")) else {
                warn!(domain = %domain, "Skipping cookie with unusable domain");
                continue;
            };
            self.jar.add_cookie_str(
                &format!(
                    "{}={}; Domain={}; Path={}",
                    cookie.name, cookie.value, domain, path
                ),
                &origin,
            );
        }
        debug!(cookies = snapshot.len(), "Synced cookies into HTTP jar");
    }

    /// Fetch `url` and return the body.
    pub async fn fetch(&self, url: &str) -> FetchResult<String> {
        let parsed = Url::parse(url).map_err(|_| ScrapeError::InvalidUrl {
            url: url.to_string(),
        })?;

        debug!(url = %url, "HTTP fallback fetch");
        let response = self
            .client
            .get(parsed)
            .header(reqwest::header::REFERER, BASE_URL)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}
