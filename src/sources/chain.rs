//! Blockchain JSON-RPC backends
//!
//! Each endpoint is its own backend, tried wholesale: block number, block body
//! and gas price must all succeed on the same endpoint for it to count.
//!
//! ## API Reference
//!
//! - `eth_blockNumber` → hex quantity
//! - `eth_getBlockByNumber(<hex>, false)` → block object with `transactions` hashes, or `null`
//! - `eth_gasPrice` → hex quantity in wei

use super::{Backend, FetchError, HttpSession, SourceAdapter, USER_AGENT};
use crate::config::redact_url;
use crate::records::ChainRecord;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Public endpoints tried after the configured one
pub const PUBLIC_ENDPOINTS: [&str; 3] = [
    "https://eth.llamarpc.com",
    "https://rpc.ankr.com/eth",
    "https://ethereum.publicnode.com",
];

const RPC_TIMEOUT: Duration = Duration::from_secs(10);
const WEI_PER_GWEI: f64 = 1e9;
const SUPPORTED_NETWORK: &str = "ethereum";

/// Build the chain adapter: the custom endpoint (if any) first, then the public ones
pub fn adapter(rpc_url: Option<String>, rpc_key: Option<String>) -> SourceAdapter<ChainRecord> {
    let session = HttpSession::with_user_agent("chain", USER_AGENT);
    let mut backends: Vec<Box<dyn Backend<ChainRecord>>> = Vec::new();

    if let Some(url) = rpc_url {
        backends.push(Box::new(RpcEndpointBackend::new(session.clone(), url, rpc_key)));
    }
    for url in PUBLIC_ENDPOINTS {
        backends.push(Box::new(RpcEndpointBackend::new(session.clone(), url, None)));
    }

    SourceAdapter::new(backends).with_session(session)
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockBody {
    #[serde(default)]
    transactions: Vec<Value>,
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_hex_quantity(raw: &str) -> Result<u128, FetchError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| FetchError::Malformed(format!("not a hex quantity: {}", raw)))?;

    if digits.is_empty() {
        return Err(FetchError::Malformed("empty hex quantity".to_string()));
    }

    u128::from_str_radix(digits, 16)
        .map_err(|e| FetchError::Malformed(format!("bad hex quantity {}: {}", raw, e)))
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

/// Transactions in a block body; a missing block counts zero
pub(crate) fn block_transaction_count(block: Option<&BlockBody>) -> u64 {
    block.map(|b| b.transactions.len() as u64).unwrap_or(0)
}

pub struct RpcEndpointBackend {
    session: HttpSession,
    url: String,
    /// Host only; provider URLs often embed the key in the path
    label: String,
    bearer: Option<String>,
}

impl RpcEndpointBackend {
    pub fn new(session: HttpSession, url: impl Into<String>, bearer: Option<String>) -> Self {
        let url = url.into();
        Self {
            session,
            label: redact_url(&url),
            url,
            bearer,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, FetchError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let mut request = self.session.client()?.post(&self.url).json(&body);
        if let Some(key) = &self.bearer {
            request = request.bearer_auth(key);
        }

        let response: RpcResponse<T> = super::send_json(request).await?;
        if let Some(err) = response.error {
            return Err(FetchError::Malformed(format!(
                "{} returned error {}: {}",
                method, err.code, err.message
            )));
        }
        Ok(response.result)
    }

    async fn quantity(&self, method: &str) -> Result<u128, FetchError> {
        let raw: String = self
            .call(method, Value::Array(Vec::new()))
            .await?
            .ok_or(FetchError::MissingField("result"))?;
        parse_hex_quantity(&raw)
    }
}

#[async_trait]
impl Backend<ChainRecord> for RpcEndpointBackend {
    fn name(&self) -> &str {
        &self.label
    }

    fn timeout(&self) -> Duration {
        RPC_TIMEOUT
    }

    async fn fetch(&self, network: &str) -> Result<ChainRecord, FetchError> {
        if !network.eq_ignore_ascii_case(SUPPORTED_NETWORK) {
            return Err(FetchError::Unavailable(format!("network {} not supported", network)));
        }

        let height = self.quantity("eth_blockNumber").await?;
        let block_height = u64::try_from(height)
            .map_err(|_| FetchError::Malformed(format!("block height {} out of range", height)))?;

        let block: Option<BlockBody> = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{:x}", block_height), false]),
            )
            .await?;

        let gas_wei = self.quantity("eth_gasPrice").await?;

        Ok(ChainRecord {
            network: network.to_string(),
            block_height,
            transaction_count: block_transaction_count(block.as_ref()),
            gas_price: Some(wei_to_gwei(gas_wei)),
            hash_rate: None,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x11a5c3f").unwrap(), 18_504_767);
        assert_eq!(parse_hex_quantity("0XFF").unwrap(), 255);

        assert!(matches!(parse_hex_quantity("1234"), Err(FetchError::Malformed(_))));
        assert!(matches!(parse_hex_quantity("0x"), Err(FetchError::Malformed(_))));
        assert!(matches!(parse_hex_quantity("0xzz"), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_wei_to_gwei() {
        assert_eq!(wei_to_gwei(25_500_000_000), 25.5);
        assert_eq!(wei_to_gwei(0), 0.0);
    }

    #[test]
    fn test_block_transaction_count() {
        let block: BlockBody =
            serde_json::from_str(r#"{"number":"0x1","transactions":["0xaa","0xbb","0xcc"]}"#)
                .unwrap();
        assert_eq!(block_transaction_count(Some(&block)), 3);
        assert_eq!(block_transaction_count(None), 0);

        let null_block: Option<BlockBody> = serde_json::from_str("null").unwrap();
        assert_eq!(block_transaction_count(null_block.as_ref()), 0);
    }

    #[test]
    fn test_adapter_endpoint_order() {
        let with_custom = adapter(
            Some("https://rpc.example.org/v2/secret-key".to_string()),
            Some("k".to_string()),
        );
        assert_eq!(
            with_custom.backend_names(),
            vec![
                "https://rpc.example.org",
                "https://eth.llamarpc.com",
                "https://rpc.ankr.com",
                "https://ethereum.publicnode.com",
            ]
        );

        let public_only = adapter(None, None);
        assert_eq!(public_only.backend_names().len(), 3);
    }

    #[tokio::test]
    async fn test_other_networks_fall_back() {
        let adapter = adapter(None, None);
        let record = adapter.fetch_latest("polygon").await;
        assert_eq!(record.network, "polygon");
        assert_eq!(record.block_height, crate::records::FALLBACK_BLOCK_HEIGHT);
        assert_eq!(record.hash_rate, Some(crate::records::FALLBACK_HASH_RATE));
    }

    #[tokio::test]
    #[ignore] // Run only when testing with live API
    async fn test_live_public_endpoint() {
        let backend = RpcEndpointBackend::new(HttpSession::new("chain"), PUBLIC_ENDPOINTS[0], None);
        let record = backend.fetch("ethereum").await.unwrap();
        assert!(record.block_height > 0);
        assert!(record.hash_rate.is_none());
    }
}
