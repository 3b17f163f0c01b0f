//! Session cookie handoff from the listing crawl to detail fetches.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// One session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

impl Cookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
        }
    }
}

/// Immutable, ordered set of cookies captured from one session.
///
/// Clones share the same backing list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSnapshot {
    cookies: Arc<Vec<Cookie>>,
}

impl CookieSnapshot {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self {
            cookies: Arc::new(cookies),
        }
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }
}

impl From<Vec<Cookie>> for CookieSnapshot {
    fn from(cookies: Vec<Cookie>) -> Self {
        Self::new(cookies)
    }
}

/// Shared holder of the most recent cookie snapshot.
///
/// `publish` and `read` are the only access paths. The lock is held only
/// for a pointer swap or clone.
#[derive(Debug, Default)]
pub struct CookieRelay {
    current: Mutex<CookieSnapshot>,
}

impl CookieRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shared snapshot wholesale.
    pub fn publish(&self, snapshot: impl Into<CookieSnapshot>) {
        let snapshot = snapshot.into();
        let count = snapshot.len();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
        tracing::debug!(cookies = count, "Published session cookies");
    }

    /// Copy of the current snapshot.
    pub fn read(&self) -> CookieSnapshot {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(value: &str) -> Vec<Cookie> {
        vec![
            Cookie::new("ASP.NET_SessionId", value, "notices.philgeps.gov.ph", "/"),
            Cookie::new("lang", "en", "notices.philgeps.gov.ph", "/"),
        ]
    }

    #[test]
    fn test_empty_by_default() {
        assert!(CookieRelay::new().read().is_empty());
    }

    #[test]
    fn test_publish_replaces_not_merges() {
        let relay = CookieRelay::new();
        relay.publish(session("first"));
        relay.publish(vec![Cookie::new("other", "1", "example.test", "/")]);

        let snapshot = relay.read();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.cookies()[0].name, "other");
    }

    #[test]
    fn test_read_is_unaffected_by_later_publish() {
        let relay = CookieRelay::new();
        relay.publish(session("first"));
        let before = relay.read();
        relay.publish(session("second"));

        assert_eq!(before.cookies()[0].value, "first");
        assert_eq!(relay.read().cookies()[0].value, "second");
    }

    #[test]
    fn test_concurrent_publishers_never_interleave() {
        let relay = Arc::new(CookieRelay::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let relay = Arc::clone(&relay);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        relay.publish(session(&format!("v{i}")));
                        let snapshot = relay.read();
                        assert_eq!(snapshot.len(), 2);
                        assert_eq!(snapshot.cookies()[1].name, "lang");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
