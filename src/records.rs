//! Normalized records published on every tick
//!
//! Each source domain produces one record type. The composite record bundles
//! all five with an aggregation timestamp and the schema version.
//!
//! Optional fields serialize as explicit `null` (never omitted) so consumers can
//! tell "unknown" apart from zero. Counts are unsigned.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema version stamped on every composite record
pub const SCHEMA_VERSION: &str = "1.0.0";

// Fallback defaults, used when every backend of a domain fails
pub const FALLBACK_PRICE: f64 = 45_000.0;
pub const FALLBACK_VOLUME: f64 = 1_234_567.89;
pub const FALLBACK_CHANGE_24H: f64 = 2.5;

pub const FALLBACK_GDP_GROWTH: f64 = 2.1;
pub const FALLBACK_INFLATION_RATE: f64 = 3.2;
pub const FALLBACK_UNEMPLOYMENT_RATE: f64 = 3.7;
pub const FALLBACK_INTEREST_RATE: f64 = 5.25;

pub const FALLBACK_BLOCK_HEIGHT: u64 = 18_500_000;
pub const FALLBACK_TRANSACTION_COUNT: u64 = 150;
pub const FALLBACK_GAS_PRICE: f64 = 25.5;
pub const FALLBACK_HASH_RATE: f64 = 350.2;

pub const FALLBACK_ACTIVE_USERS: u64 = 1_234;
pub const FALLBACK_TRANSACTIONS_24H: u64 = 5_678;
pub const FALLBACK_TOTAL_VOLUME_24H: f64 = 9_876_543.21;
pub const FALLBACK_TOP_SYMBOLS: [&str; 5] = ["BTC/USD", "ETH/USD", "SOL/USD", "BNB/USD", "ADA/USD"];

/// The five source domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Price,
    Macro,
    Sentiment,
    Chain,
    Activity,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Price => "price",
            Domain::Macro => "macro",
            Domain::Sentiment => "sentiment",
            Domain::Chain => "chain",
            Domain::Activity => "activity",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-domain record with a static fallback
///
/// `fallback` must always succeed: it is the last tier of every fallback chain.
/// The selector (symbol, region, network) is echoed into the record where the
/// schema has a field for it.
pub trait DomainRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const DOMAIN: Domain;

    fn fallback(selector: &str) -> Self;
}

/// Latest quote for one market symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    /// Percentage change over the trailing window
    pub change_24h: f64,
    pub timestamp: DateTime<Utc>,
}

impl DomainRecord for PriceRecord {
    const DOMAIN: Domain = Domain::Price;

    fn fallback(selector: &str) -> Self {
        Self {
            symbol: selector.to_string(),
            price: FALLBACK_PRICE,
            volume: FALLBACK_VOLUME,
            change_24h: FALLBACK_CHANGE_24H,
            timestamp: Utc::now(),
        }
    }
}

/// Macroeconomic indicators for one region, all in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub gdp_growth: Option<f64>,
    pub inflation_rate: Option<f64>,
    pub unemployment_rate: Option<f64>,
    pub interest_rate: Option<f64>,
    pub region: String,
    pub timestamp: DateTime<Utc>,
}

impl MacroRecord {
    /// True when no indicator is known
    pub fn is_empty(&self) -> bool {
        self.gdp_growth.is_none()
            && self.inflation_rate.is_none()
            && self.unemployment_rate.is_none()
            && self.interest_rate.is_none()
    }
}

impl DomainRecord for MacroRecord {
    const DOMAIN: Domain = Domain::Macro;

    fn fallback(selector: &str) -> Self {
        Self {
            gdp_growth: Some(FALLBACK_GDP_GROWTH),
            inflation_rate: Some(FALLBACK_INFLATION_RATE),
            unemployment_rate: Some(FALLBACK_UNEMPLOYMENT_RATE),
            interest_rate: Some(FALLBACK_INTEREST_RATE),
            region: selector.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Label thresholds: strictly above 0.3 is positive, strictly below -0.3 negative
    pub fn from_score(score: f64) -> Self {
        if score > 0.3 {
            SentimentLabel::Positive
        } else if score < -0.3 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// Headline sentiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    /// In [-1, 1]
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub article_count: u32,
    pub keywords: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl DomainRecord for SentimentRecord {
    const DOMAIN: Domain = Domain::Sentiment;

    fn fallback(_selector: &str) -> Self {
        Self {
            sentiment_score: 0.0,
            sentiment_label: SentimentLabel::Neutral,
            article_count: 0,
            keywords: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Latest block on one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub network: String,
    pub block_height: u64,
    /// Transactions in the latest block
    pub transaction_count: u64,
    /// Gwei
    pub gas_price: Option<f64>,
    pub hash_rate: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl DomainRecord for ChainRecord {
    const DOMAIN: Domain = Domain::Chain;

    fn fallback(selector: &str) -> Self {
        Self {
            network: selector.to_string(),
            block_height: FALLBACK_BLOCK_HEIGHT,
            transaction_count: FALLBACK_TRANSACTION_COUNT,
            gas_price: Some(FALLBACK_GAS_PRICE),
            hash_rate: Some(FALLBACK_HASH_RATE),
            timestamp: Utc::now(),
        }
    }
}

/// Platform user activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub active_users: u64,
    pub transactions_24h: u64,
    /// Never negative
    pub total_volume_24h: f64,
    pub top_symbols: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl DomainRecord for ActivityRecord {
    const DOMAIN: Domain = Domain::Activity;

    fn fallback(_selector: &str) -> Self {
        Self {
            active_users: FALLBACK_ACTIVE_USERS,
            transactions_24h: FALLBACK_TRANSACTIONS_24H,
            total_volume_24h: FALLBACK_TOTAL_VOLUME_24H,
            top_symbols: FALLBACK_TOP_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            timestamp: Utc::now(),
        }
    }
}

/// The snapshot published on every tick
///
/// Structurally complete by construction: every domain field is a concrete
/// record, live or fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRecord {
    pub market_stream: PriceRecord,
    pub macro_econ: MacroRecord,
    pub news_sentiment: SentimentRecord,
    pub blockchain: ChainRecord,
    pub user_activity: ActivityRecord,
    pub aggregated_at: DateTime<Utc>,
    pub version: String,
}

impl CompositeRecord {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback_composite() -> CompositeRecord {
        CompositeRecord {
            market_stream: PriceRecord::fallback("BTCUSD"),
            macro_econ: MacroRecord::fallback("US"),
            news_sentiment: SentimentRecord::fallback(""),
            blockchain: ChainRecord::fallback("ethereum"),
            user_activity: ActivityRecord::fallback(""),
            aggregated_at: Utc::now(),
            version: SCHEMA_VERSION.to_string(),
        }
    }

    #[test]
    fn test_fallbacks_echo_selector() {
        assert_eq!(PriceRecord::fallback("ETHUSD").symbol, "ETHUSD");
        assert_eq!(MacroRecord::fallback("EU").region, "EU");
        assert_eq!(ChainRecord::fallback("polygon").network, "polygon");
    }

    #[test]
    fn test_fallback_values() {
        let price = PriceRecord::fallback("BTCUSD");
        assert_eq!(price.price, 45_000.0);
        assert_eq!(price.change_24h, 2.5);

        let chain = ChainRecord::fallback("ethereum");
        assert_eq!(chain.block_height, 18_500_000);
        assert_eq!(chain.gas_price, Some(25.5));

        let activity = ActivityRecord::fallback("");
        assert_eq!(activity.top_symbols.len(), 5);
        assert_eq!(activity.top_symbols[0], "BTC/USD");

        let sentiment = SentimentRecord::fallback("");
        assert_eq!(sentiment.sentiment_label, SentimentLabel::Neutral);
        assert_eq!(sentiment.article_count, 0);
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(1.0), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.31), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.3), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.3), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.5), SentimentLabel::Negative);
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let mut chain = ChainRecord::fallback("ethereum");
        chain.hash_rate = None;
        let value = serde_json::to_value(&chain).unwrap();
        assert!(value.get("hash_rate").unwrap().is_null());

        let mut macro_econ = MacroRecord::fallback("US");
        macro_econ.gdp_growth = None;
        let value = serde_json::to_value(&macro_econ).unwrap();
        assert!(value.get("gdp_growth").unwrap().is_null());
    }

    #[test]
    fn test_composite_json_shape() {
        let record = fallback_composite();
        let value = serde_json::to_value(&record).unwrap();

        for key in [
            "market_stream",
            "macro_econ",
            "news_sentiment",
            "blockchain",
            "user_activity",
            "aggregated_at",
            "version",
        ] {
            assert!(value.get(key).is_some(), "missing field {}", key);
        }

        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["news_sentiment"]["sentiment_label"], "neutral");
        // Timestamps are ISO-8601 strings
        let stamp = value["aggregated_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_composite_round_trip() {
        let record = fallback_composite();
        let payload = record.to_json().unwrap();
        let decoded = CompositeRecord::from_json(&payload).unwrap();
        assert_eq!(decoded, record);
    }
}
