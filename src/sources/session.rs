//! Per-adapter pooled HTTP client handle
//!
//! One `HttpSession` belongs to one adapter and is cloned into that adapter's
//! backends only. The underlying `reqwest::Client` is built on `open()` or on
//! first use and dropped on `close()`, which releases its connection pool.

use super::FetchError;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct HttpSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    label: &'static str,
    user_agent: Option<String>,
    client: Mutex<Option<reqwest::Client>>,
}

impl HttpSession {
    pub fn new(label: &'static str) -> Self {
        Self::build(label, None)
    }

    /// Session that sends a fixed User-Agent header on every request
    pub fn with_user_agent(label: &'static str, user_agent: impl Into<String>) -> Self {
        Self::build(label, Some(user_agent.into()))
    }

    fn build(label: &'static str, user_agent: Option<String>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                label,
                user_agent,
                client: Mutex::new(None),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        self.inner.label
    }

    /// Build the pooled client if it is not open yet
    pub fn open(&self) -> Result<(), FetchError> {
        self.client().map(|_| ())
    }

    /// Cheap handle to the pooled client, opening it on first use
    pub fn client(&self) -> Result<reqwest::Client, FetchError> {
        let mut guard = self.inner.client.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        if let Some(user_agent) = &self.inner.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;

        log::debug!("🔗 Opened HTTP session for {}", self.inner.label);
        *guard = Some(client.clone());
        Ok(client)
    }

    pub fn is_open(&self) -> bool {
        self.inner
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the pooled client. Returns false when there was nothing to release.
    pub fn close(&self) -> bool {
        let released = self
            .inner
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if released {
            log::debug!("🔌 Closed HTTP session for {}", self.inner.label);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_open_and_idempotent_close() {
        let session = HttpSession::new("test");
        assert!(!session.is_open());

        session.client().unwrap();
        assert!(session.is_open());

        assert!(session.close());
        assert!(!session.close());
        assert!(!session.is_open());
    }

    #[test]
    fn test_clones_share_the_pool() {
        let session = HttpSession::with_user_agent("test", "agent/1.0");
        let clone = session.clone();

        session.open().unwrap();
        assert!(clone.is_open());

        assert!(clone.close());
        assert!(!session.is_open());
    }
}
