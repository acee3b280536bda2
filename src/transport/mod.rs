//! Publish sinks for serialized composite records
//!
//! `REDIS_URL` picks the sink by scheme: `redis://` / `rediss://` publish on a
//! Redis channel, `file://` appends to a rotating JSONL file.

pub mod jsonl_sink;
pub mod redis_sink;

pub use jsonl_sink::JsonlSink;
pub use redis_sink::RedisSink;

use crate::config::{redact_url, BroadcastConfig, ConfigError};
use async_trait::async_trait;

#[derive(Debug)]
pub enum TransportError {
    Connection(String),
    Publish(String),
    Io(std::io::Error),
    NotConnected,
}

impl From<redis::RedisError> for TransportError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Publish(err.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connection(e) => write!(f, "Connection error: {}", e),
            TransportError::Publish(e) => write!(f, "Publish error: {}", e),
            TransportError::Io(e) => write!(f, "IO error: {}", e),
            TransportError::NotConnected => write!(f, "Sink is not connected"),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait TransportSink: Send {
    /// Acquire the connection; failure here is fatal for the loop
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Deliver one payload on `topic`
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError>;

    /// Release the connection; repeated calls are no-ops
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Get sink type for logging
    fn sink_type(&self) -> &'static str;
}

/// Build the sink named by `transport_url`
pub fn sink_from_config(config: &BroadcastConfig) -> Result<Box<dyn TransportSink>, ConfigError> {
    let url = config.transport_url.as_str();

    if let Some(path) = url.strip_prefix("file://") {
        if path.is_empty() {
            return Err(ConfigError::InvalidValue(
                "REDIS_URL file:// needs a path".to_string(),
            ));
        }
        return Ok(Box::new(JsonlSink::new(
            path,
            config.output_max_size_mb,
            config.output_max_rotations,
        )));
    }

    if url.starts_with("redis://") || url.starts_with("rediss://") {
        return Ok(Box::new(RedisSink::new(url)));
    }

    Err(ConfigError::InvalidValue(format!(
        "REDIS_URL must start with redis://, rediss:// or file://, got '{}'",
        redact_url(url)
    )))
}
