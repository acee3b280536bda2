//! Broadcaster configuration from environment variables
//!
//! Environment variables:
//! - `REDIS_URL` (default: redis://localhost:6379/0; `file://` selects the JSONL sink)
//! - `REDIS_CHANNEL` (default: terminal-v:data)
//! - `BROADCAST_INTERVAL_MS` (default: 200)
//! - `TICK_DEADLINE_MS` (default: unset, no per-tick bound)
//! - `MARKET_SYMBOLS` (default: BTCUSD,SPX,EURUSD)
//! - `MACRO_REGION` (default: US)
//! - `BLOCKCHAIN_NETWORK` (default: ethereum)
//! - `NEWS_QUERY` (default: bitcoin OR cryptocurrency OR stock market OR trading)
//! - `NEWSAPI_KEY`, `FRED_API_KEY`, `BLOCKCHAIN_RPC_URL`, `BLOCKCHAIN_RPC_KEY`, `ACTIVITY_DB_PATH`
//! - `OUTPUT_MAX_SIZE_MB` (default: 100), `OUTPUT_MAX_ROTATIONS` (default: 10)
//! - `RUST_LOG` (default: info)
//!
//! Blank values count as unset.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TRANSPORT_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_TOPIC: &str = "terminal-v:data";
pub const DEFAULT_INTERVAL_MS: u64 = 200;
pub const DEFAULT_SYMBOLS: [&str; 3] = ["BTCUSD", "SPX", "EURUSD"];
pub const DEFAULT_REGION: &str = "US";
pub const DEFAULT_NETWORK: &str = "ethereum";
pub const DEFAULT_NEWS_QUERY: &str = "bitcoin OR cryptocurrency OR stock market OR trading";

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Optional upstream credentials; a missing one disables only its backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub newsapi_key: Option<String>,
    pub fred_api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub rpc_key: Option<String>,
    pub activity_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    /// Sink address: `redis://`, `rediss://` or `file://`
    pub transport_url: String,
    pub topic: String,
    pub interval_ms: u64,
    /// Upper bound for each adapter call within one tick
    pub tick_deadline_ms: Option<u64>,
    /// Tracked market symbols; the first one is fetched each tick
    pub symbols: Vec<String>,
    pub region: String,
    pub network: String,
    pub news_query: String,
    pub credentials: Credentials,
    pub output_max_size_mb: u64,
    pub output_max_rotations: u32,
    pub rust_log: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            transport_url: DEFAULT_TRANSPORT_URL.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            tick_deadline_ms: None,
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            region: DEFAULT_REGION.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            news_query: DEFAULT_NEWS_QUERY.to_string(),
            credentials: Credentials::default(),
            output_max_size_mb: 100,
            output_max_rotations: 10,
            rust_log: "info".to_string(),
        }
    }
}

impl BroadcastConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let topic = match lookup("REDIS_CHANNEL") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::InvalidValue("REDIS_CHANNEL cannot be empty".to_string()))
            }
            Some(raw) => raw.trim().to_string(),
            None => defaults.topic,
        };

        let interval_ms = match get("BROADCAST_INTERVAL_MS") {
            Some(raw) => parse_positive_ms("BROADCAST_INTERVAL_MS", &raw)?,
            None => defaults.interval_ms,
        };

        let tick_deadline_ms = get("TICK_DEADLINE_MS")
            .map(|raw| parse_positive_ms("TICK_DEADLINE_MS", &raw))
            .transpose()?;

        let symbols: Vec<String> = get("MARKET_SYMBOLS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let symbols = if symbols.is_empty() {
            defaults.symbols
        } else {
            symbols
        };

        Ok(Self {
            transport_url: get("REDIS_URL").unwrap_or(defaults.transport_url),
            topic,
            interval_ms,
            tick_deadline_ms,
            symbols,
            region: get("MACRO_REGION").unwrap_or(defaults.region),
            network: get("BLOCKCHAIN_NETWORK").unwrap_or(defaults.network),
            news_query: get("NEWS_QUERY").unwrap_or(defaults.news_query),
            credentials: Credentials {
                newsapi_key: get("NEWSAPI_KEY"),
                fred_api_key: get("FRED_API_KEY"),
                rpc_url: get("BLOCKCHAIN_RPC_URL"),
                rpc_key: get("BLOCKCHAIN_RPC_KEY"),
                activity_db_path: get("ACTIVITY_DB_PATH").map(PathBuf::from),
            },
            output_max_size_mb: get("OUTPUT_MAX_SIZE_MB")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.output_max_size_mb),
            output_max_rotations: get("OUTPUT_MAX_ROTATIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.output_max_rotations),
            rust_log: get("RUST_LOG").unwrap_or(defaults.rust_log),
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn tick_deadline(&self) -> Option<Duration> {
        self.tick_deadline_ms.map(Duration::from_millis)
    }
}

/// Symbol fetched by the price adapter: the first tracked one, or the default when none are tracked
pub fn primary_symbol(symbols: &[String]) -> &str {
    symbols.first().map(String::as_str).unwrap_or(DEFAULT_SYMBOLS[0])
}

/// Scheme, host and port of `raw` only: credentials, paths and query strings
/// are dropped. `file://` URLs keep their path.
pub fn redact_url(raw: &str) -> String {
    let url = match reqwest::Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return "<unparseable url>".to_string(),
    };

    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
        (Some(host), None) => format!("{}://{}", url.scheme(), host),
        (None, _) if url.scheme() == "file" => format!("file://{}", url.path()),
        (None, _) => format!("{}://", url.scheme()),
    }
}

fn parse_positive_ms(var: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue(format!("{} must be greater than 0", var))),
        Ok(ms) => Ok(ms),
        Err(_) => Err(ConfigError::InvalidValue(format!(
            "{} must be a whole number of milliseconds, got '{}'",
            var, raw
        ))),
    }
}
