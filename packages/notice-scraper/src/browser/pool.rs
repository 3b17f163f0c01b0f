//! One lazily created browser session per detail worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::browser::{BrowserEngine, BrowserSession, SessionProfile, WorkerId};
use crate::cookies::CookieSnapshot;
use crate::error::BrowserResult;

/// Session cache keyed by worker.
///
/// A worker gets the same session on every `acquire` until it calls
/// `release`; no worker ever receives another worker's session. The map lock
/// is never held across a launch or close.
pub struct SessionPool<E: BrowserEngine> {
    engine: Arc<E>,
    profile: SessionProfile,
    sessions: Mutex<HashMap<WorkerId, Arc<E::Session>>>,
}

impl<E: BrowserEngine> SessionPool<E> {
    pub fn new(engine: Arc<E>, profile: SessionProfile) -> Self {
        Self {
            engine,
            profile,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The worker's session, launching it on first use.
    ///
    /// `cookies` are injected only when the session is created.
    pub async fn acquire(
        &self,
        worker: WorkerId,
        cookies: &CookieSnapshot,
    ) -> BrowserResult<Arc<E::Session>> {
        let existing = self.lock().get(&worker).cloned();
        if let Some(session) = existing {
            return Ok(session);
        }

        debug!(%worker, cookies = cookies.len(), "Launching pooled session");
        let session = self.engine.launch(&self.profile).await?;
        if !cookies.is_empty() {
            if let Err(e) = session.add_cookies(cookies.cookies()).await {
                close(worker, &session).await;
                return Err(e);
            }
        }

        let session = Arc::new(session);
        self.lock().insert(worker, Arc::clone(&session));
        Ok(session)
    }

    /// Close the worker's session. No-op when it never acquired one.
    pub async fn release(&self, worker: WorkerId) {
        let session = self.lock().remove(&worker);
        if let Some(session) = session {
            close(worker, session.as_ref()).await;
        }
    }

    /// Close every remaining session.
    pub async fn release_all(&self) {
        let sessions: Vec<_> = self.lock().drain().collect();
        for (worker, session) in sessions {
            close(worker, session.as_ref()).await;
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WorkerId, Arc<E::Session>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn close<S: BrowserSession>(worker: WorkerId, session: &S) {
    match session.close().await {
        Ok(()) => debug!(%worker, "Released pooled session"),
        Err(e) => warn!(%worker, error = %e, "Failed to close pooled session"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;
    use crate::testing::MockEngine;

    fn pool(engine: &Arc<MockEngine>) -> SessionPool<MockEngine> {
        SessionPool::new(Arc::clone(engine), SessionProfile::default())
    }

    #[tokio::test]
    async fn test_same_worker_gets_same_session() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);
        let cookies = CookieSnapshot::default();

        let first = pool.acquire(WorkerId(0), &cookies).await.unwrap();
        let second = pool.acquire(WorkerId(0), &cookies).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_workers_never_share_sessions() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);
        let cookies = CookieSnapshot::default();

        let a = pool.acquire(WorkerId(0), &cookies).await.unwrap();
        let b = pool.acquire(WorkerId(1), &cookies).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.len(), 2);
    }

    #[tokio::test]
    async fn test_cookies_injected_once_at_creation() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);
        let cookies = CookieSnapshot::new(vec![Cookie::new("sid", "abc", "example.test", "/")]);

        let session = pool.acquire(WorkerId(3), &cookies).await.unwrap();
        let later = CookieSnapshot::new(vec![Cookie::new("sid", "zzz", "example.test", "/")]);
        pool.acquire(WorkerId(3), &later).await.unwrap();

        assert_eq!(session.injected_cookies(), cookies.cookies().to_vec());
    }

    #[tokio::test]
    async fn test_release_closes_only_that_worker() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);
        let cookies = CookieSnapshot::default();

        let a = pool.acquire(WorkerId(0), &cookies).await.unwrap();
        let b = pool.acquire(WorkerId(1), &cookies).await.unwrap();
        pool.release(WorkerId(0)).await;

        assert!(a.is_closed());
        assert!(!b.is_closed());

        let again = pool.acquire(WorkerId(0), &cookies).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_release_without_session_is_noop() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);

        pool.release(WorkerId(7)).await;

        assert!(pool.is_empty());
        assert_eq!(engine.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_release_all() {
        let engine = Arc::new(MockEngine::new());
        let pool = pool(&engine);
        let cookies = CookieSnapshot::default();

        let sessions = vec![
            pool.acquire(WorkerId(0), &cookies).await.unwrap(),
            pool.acquire(WorkerId(1), &cookies).await.unwrap(),
        ];
        pool.release_all().await;

        assert!(pool.is_empty());
        assert!(sessions.iter().all(|s| s.is_closed()));
    }
}
