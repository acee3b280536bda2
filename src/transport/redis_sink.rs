use super::{TransportError, TransportSink};
use crate::config::redact_url;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client as RedisClient;

/// Publishes payloads with `PUBLISH` over a multiplexed tokio connection
pub struct RedisSink {
    url: String,
    connection: Option<MultiplexedConnection>,
}

impl RedisSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

#[async_trait]
impl TransportSink for RedisSink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let client = RedisClient::open(self.url.as_str())
            .map_err(|e| TransportError::Connection(format!("Failed to create Redis client: {}", e)))?;

        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TransportError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| TransportError::Connection(format!("Redis PING failed: {}", e)))?;

        log::debug!("Connected to Redis at {} ({})", redact_url(&self.url), pong);
        self.connection = Some(connection);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        let connection = self.connection.as_mut().ok_or(TransportError::NotConnected)?;

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(payload)
            .query_async(connection)
            .await?;

        log::trace!("Published {} bytes to {} ({} receivers)", payload.len(), topic, receivers);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connection.take().is_some() {
            log::debug!("Closed Redis connection to {}", redact_url(&self.url));
        }
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "Redis"
    }
}
