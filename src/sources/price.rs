//! Market price backends
//!
//! Chain: CoinGecko (crypto symbols only) → Yahoo Finance chart API → fallback.
//!
//! ## API Reference
//!
//! - `GET https://api.coingecko.com/api/v3/simple/price?ids={id}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true`
//! - `GET https://query1.finance.yahoo.com/v8/finance/chart/{ticker}?interval=1m&range=1d`

use super::{send_json, Backend, FetchError, HttpSession, SourceAdapter, USER_AGENT};
use crate::records::PriceRecord;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const COINGECKO_TIMEOUT: Duration = Duration::from_secs(5);
const YAHOO_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the price adapter with its own pooled session
pub fn adapter() -> SourceAdapter<PriceRecord> {
    let session = HttpSession::with_user_agent("price", USER_AGENT);

    SourceAdapter::new(vec![
        Box::new(CoinGeckoBackend::new(session.clone())),
        Box::new(YahooFinanceBackend::new(session.clone())),
    ])
    .with_session(session)
}

/// CoinGecko coin id for a crypto symbol, `None` for anything else
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let upper = symbol.to_uppercase();
    match upper.as_str() {
        "BTCUSD" | "BTC" => Some("bitcoin"),
        "ETHUSD" | "ETH" => Some("ethereum"),
        _ if upper.contains("BTC") => Some("bitcoin"),
        _ if upper.contains("ETH") => Some("ethereum"),
        _ => None,
    }
}

/// Yahoo Finance ticker for a tracked symbol
pub fn yahoo_ticker(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    if upper.contains("BTC") {
        "BTC-USD".to_string()
    } else if upper.contains("EUR") {
        "EURUSD=X".to_string()
    } else if upper == "SPX" {
        "^GSPC".to_string()
    } else {
        upper.replace('/', "")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoinGeckoQuote {
    usd: Option<f64>,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

pub(crate) fn parse_coingecko(
    quotes: &HashMap<String, CoinGeckoQuote>,
    coin_id: &str,
    symbol: &str,
) -> Result<PriceRecord, FetchError> {
    let quote = quotes.get(coin_id).ok_or(FetchError::MissingField("coin id"))?;
    let price = quote.usd.ok_or(FetchError::MissingField("usd"))?;

    Ok(PriceRecord {
        symbol: symbol.to_string(),
        price,
        volume: quote.usd_24h_vol.unwrap_or(0.0).max(0.0),
        change_24h: quote.usd_24h_change.unwrap_or(0.0),
        timestamp: Utc::now(),
    })
}

pub struct CoinGeckoBackend {
    session: HttpSession,
}

impl CoinGeckoBackend {
    pub fn new(session: HttpSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Backend<PriceRecord> for CoinGeckoBackend {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn timeout(&self) -> Duration {
        COINGECKO_TIMEOUT
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceRecord, FetchError> {
        let coin_id = coingecko_id(symbol)
            .ok_or_else(|| FetchError::Unavailable(format!("{} is not a crypto symbol", symbol)))?;

        let request = self.session.client()?.get(COINGECKO_URL).query(&[
            ("ids", coin_id),
            ("vs_currencies", "usd"),
            ("include_24hr_change", "true"),
            ("include_24hr_vol", "true"),
        ]);

        let quotes: HashMap<String, CoinGeckoQuote> = send_json(request).await?;
        parse_coingecko(&quotes, coin_id, symbol)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Price = last close, change = last vs first close of the session in percent
pub(crate) fn parse_yahoo_chart(
    response: &ChartResponse,
    symbol: &str,
) -> Result<PriceRecord, FetchError> {
    let series = response
        .chart
        .result
        .as_ref()
        .and_then(|results| results.first())
        .and_then(|result| result.indicators.quote.first())
        .ok_or(FetchError::MissingField("chart.result"))?;

    let closes: Vec<f64> = series.close.iter().flatten().copied().collect();
    let (first, last) = match (closes.first(), closes.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(FetchError::Empty),
    };

    if first == 0.0 {
        return Err(FetchError::Malformed("opening close is zero".to_string()));
    }

    let volume = series
        .volume
        .iter()
        .rev()
        .flatten()
        .next()
        .copied()
        .unwrap_or(0.0)
        .max(0.0);

    Ok(PriceRecord {
        symbol: symbol.to_string(),
        price: last,
        volume,
        change_24h: (last - first) / first * 100.0,
        timestamp: Utc::now(),
    })
}

pub struct YahooFinanceBackend {
    session: HttpSession,
}

impl YahooFinanceBackend {
    pub fn new(session: HttpSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Backend<PriceRecord> for YahooFinanceBackend {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn timeout(&self) -> Duration {
        YAHOO_TIMEOUT
    }

    async fn fetch(&self, symbol: &str) -> Result<PriceRecord, FetchError> {
        let url = format!("{}/{}", YAHOO_CHART_URL, yahoo_ticker(symbol));
        let request = self
            .session
            .client()?
            .get(&url)
            .query(&[("interval", "1m"), ("range", "1d")]);

        let chart: ChartResponse = send_json(request).await?;
        parse_yahoo_chart(&chart, symbol)
    }
}
