//! Source adapters: one per domain, each an ordered fallback chain of backends
//!
//! ## Contract
//!
//! `SourceAdapter::fetch_latest` never fails. Each backend attempt runs under
//! its own timeout and returns `Result<R, FetchError>`; a failure is logged and
//! the next backend is tried. The first success short-circuits the chain. When
//! every backend fails the domain's static fallback record is returned.
//!
//! ## Module Organization
//!
//! - `session` - Pooled HTTP client handle owned by one adapter
//! - `price` - CoinGecko → Yahoo Finance
//! - `macro_econ` - FRED → economic calendar (always-miss)
//! - `sentiment` - NewsAPI → Reddit, keyword scoring
//! - `chain` - Ordered JSON-RPC endpoints
//! - `activity` - Internal SQLite activity store

pub mod activity;
pub mod chain;
pub mod macro_econ;
pub mod price;
pub mod sentiment;
pub mod session;

pub use session::HttpSession;

use crate::records::{Domain, DomainRecord};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; nexus-broadcaster/0.1)";

/// One failed backend attempt
#[derive(Debug)]
pub enum FetchError {
    Timeout(Duration),
    Http(String),
    Status(u16),
    Malformed(String),
    MissingField(&'static str),
    /// Backend cannot serve this call at all: missing credentials, unsupported selector
    Unavailable(String),
    /// Backend answered but had nothing usable
    Empty,
    Store(String),
}

/// The request URL is stripped: query strings may carry API keys
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for FetchError {
    fn from(err: rusqlite::Error) -> Self {
        FetchError::Store(err.to_string())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            FetchError::Http(e) => write!(f, "HTTP error: {}", e),
            FetchError::Status(code) => write!(f, "unexpected status {}", code),
            FetchError::Malformed(e) => write!(f, "malformed response: {}", e),
            FetchError::MissingField(field) => write!(f, "missing field '{}'", field),
            FetchError::Unavailable(reason) => write!(f, "unavailable: {}", reason),
            FetchError::Empty => write!(f, "no usable data"),
            FetchError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

/// Every backend of one adapter failed
#[derive(Debug)]
pub struct ChainExhausted {
    pub domain: Domain,
    pub selector: String,
    pub failures: Vec<(String, FetchError)>,
}

impl fmt::Display for ChainExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all {} {} backends failed for '{}'",
            self.failures.len(),
            self.domain,
            self.selector
        )?;
        for (backend, err) in &self.failures {
            write!(f, "; {}: {}", backend, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ChainExhausted {}

/// One upstream provider for records of type `R`
#[async_trait]
pub trait Backend<R: Send>: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Upper bound for one `fetch` call
    fn timeout(&self) -> Duration;

    async fn fetch(&self, selector: &str) -> Result<R, FetchError>;

    /// Acquire long-lived resources (called from `initialize`)
    async fn open(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Release long-lived resources; must tolerate repeated calls
    async fn close(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Ordered fallback chain for one domain
pub struct SourceAdapter<R: DomainRecord> {
    backends: Vec<Box<dyn Backend<R>>>,
    session: Option<HttpSession>,
}

impl<R: DomainRecord> SourceAdapter<R> {
    pub fn new(backends: Vec<Box<dyn Backend<R>>>) -> Self {
        Self {
            backends,
            session: None,
        }
    }

    /// Attach the HTTP session shared by this adapter's backends
    pub fn with_session(mut self, session: HttpSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn domain(&self) -> Domain {
        R::DOMAIN
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn session(&self) -> Option<&HttpSession> {
        self.session.as_ref()
    }

    /// Open the session and any backend resources. Failures are logged only:
    /// the session reopens on first use and a failing backend just misses.
    pub async fn initialize(&self) {
        if let Some(session) = &self.session {
            if let Err(e) = session.open() {
                log::warn!("⚠️  Failed to open {} session: {}", R::DOMAIN, e);
            }
        }

        for backend in &self.backends {
            if let Err(e) = backend.open().await {
                log::warn!("⚠️  Failed to open {} backend {}: {}", R::DOMAIN, backend.name(), e);
            }
        }
    }

    /// Run the chain without the fallback tier
    pub async fn try_fetch(&self, selector: &str) -> Result<R, ChainExhausted> {
        let mut failures = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            let limit = backend.timeout();
            let outcome = match tokio::time::timeout(limit, backend.fetch(selector)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(limit)),
            };

            match outcome {
                Ok(record) => {
                    log::debug!("✅ {} served by {} ('{}')", R::DOMAIN, backend.name(), selector);
                    return Ok(record);
                }
                Err(FetchError::Unavailable(reason)) => {
                    log::debug!("{} backend {} skipped: {}", R::DOMAIN, backend.name(), reason);
                    failures.push((backend.name().to_string(), FetchError::Unavailable(reason)));
                }
                Err(e) => {
                    log::warn!(
                        "⚠️  {} backend {} failed for '{}': {}",
                        R::DOMAIN,
                        backend.name(),
                        selector,
                        e
                    );
                    failures.push((backend.name().to_string(), e));
                }
            }
        }

        Err(ChainExhausted {
            domain: R::DOMAIN,
            selector: selector.to_string(),
            failures,
        })
    }

    /// Best-effort record: live data, or the domain fallback when the chain is exhausted
    pub async fn fetch_latest(&self, selector: &str) -> R {
        match self.try_fetch(selector).await {
            Ok(record) => record,
            Err(exhausted) => {
                log::warn!("⚠️  {}, using fallback", exhausted);
                R::fallback(selector)
            }
        }
    }

    /// Release the session and backend resources. Every backend is closed even
    /// when an earlier one fails; the failures are returned for logging.
    pub async fn shutdown(&self) -> Result<(), Vec<(String, FetchError)>> {
        if let Some(session) = &self.session {
            session.close();
        }

        let mut failures = Vec::new();
        for backend in &self.backends {
            if let Err(e) = backend.close().await {
                failures.push((backend.name().to_string(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

/// Send a request and decode a JSON body, treating non-2xx as a soft failure
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }

    Ok(response.json::<T>().await?)
}
