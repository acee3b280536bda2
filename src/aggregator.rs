//! Aggregation orchestrator
//!
//! One pass fans out to all five source adapters concurrently, waits for every
//! one of them, and assembles a `CompositeRecord`. Adapters never fail (they
//! fall back), so a pass always yields a fully shaped record. With a tick
//! deadline configured, an adapter that overruns it contributes its fallback.

use crate::config::{primary_symbol, BroadcastConfig};
use crate::records::{
    ActivityRecord, ChainRecord, CompositeRecord, DomainRecord, MacroRecord, PriceRecord,
    SentimentRecord, SCHEMA_VERSION,
};
use crate::sources::{activity, chain, macro_econ, price, sentiment, SourceAdapter};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

/// The five adapters, one per domain
pub struct SourceAdapters {
    pub price: SourceAdapter<PriceRecord>,
    pub macro_econ: SourceAdapter<MacroRecord>,
    pub sentiment: SourceAdapter<SentimentRecord>,
    pub chain: SourceAdapter<ChainRecord>,
    pub activity: SourceAdapter<ActivityRecord>,
}

impl SourceAdapters {
    /// Production adapters wired with the configured credentials
    pub fn from_config(config: &BroadcastConfig) -> Self {
        let credentials = &config.credentials;

        Self {
            price: price::adapter(),
            macro_econ: macro_econ::adapter(credentials.fred_api_key.clone()),
            sentiment: sentiment::adapter(credentials.newsapi_key.clone()),
            chain: chain::adapter(credentials.rpc_url.clone(), credentials.rpc_key.clone()),
            activity: activity::adapter(credentials.activity_db_path.clone()),
        }
    }
}

pub struct Aggregator {
    adapters: SourceAdapters,
    symbols: Vec<String>,
    news_query: String,
    tick_deadline: Option<Duration>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
    /// Last aggregation stamp in microseconds, never moves backwards
    last_stamp_micros: AtomicI64,
}

impl Aggregator {
    pub fn new(adapters: SourceAdapters, symbols: Vec<String>, news_query: impl Into<String>) -> Self {
        Self {
            adapters,
            symbols,
            news_query: news_query.into(),
            tick_deadline: None,
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            last_stamp_micros: AtomicI64::new(i64::MIN),
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        let aggregator = Self::new(
            SourceAdapters::from_config(config),
            config.symbols.clone(),
            config.news_query.clone(),
        );

        match config.tick_deadline() {
            Some(deadline) => aggregator.with_tick_deadline(deadline),
            None => aggregator,
        }
    }

    /// Bound every adapter call within one pass
    pub fn with_tick_deadline(mut self, deadline: Duration) -> Self {
        self.tick_deadline = Some(deadline);
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn adapters(&self) -> &SourceAdapters {
        &self.adapters
    }

    /// Open every adapter's outbound resources; repeated calls are no-ops
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shut_down.store(false, Ordering::SeqCst);

        tokio::join!(
            self.adapters.price.initialize(),
            self.adapters.macro_econ.initialize(),
            self.adapters.sentiment.initialize(),
            self.adapters.chain.initialize(),
            self.adapters.activity.initialize(),
        );

        log::info!("✅ Aggregator initialized ({} symbols tracked)", self.symbols.len());
    }

    /// One aggregation pass: all five domains, concurrently
    pub async fn aggregate(&self, region: &str, network: &str) -> CompositeRecord {
        let symbol = primary_symbol(&self.symbols);

        let (market_stream, macro_econ, news_sentiment, blockchain, user_activity) = tokio::join!(
            self.bounded(&self.adapters.price, symbol),
            self.bounded(&self.adapters.macro_econ, region),
            self.bounded(&self.adapters.sentiment, &self.news_query),
            self.bounded(&self.adapters.chain, network),
            self.bounded(&self.adapters.activity, ""),
        );

        CompositeRecord {
            market_stream,
            macro_econ,
            news_sentiment,
            blockchain,
            user_activity,
            aggregated_at: self.next_stamp(),
            version: SCHEMA_VERSION.to_string(),
        }
    }

    /// Release every adapter's resources. One adapter failing to close does
    /// not stop the others; repeated calls are no-ops.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.initialized.store(false, Ordering::SeqCst);

        let results = [
            (self.adapters.price.domain(), self.adapters.price.shutdown().await),
            (self.adapters.macro_econ.domain(), self.adapters.macro_econ.shutdown().await),
            (self.adapters.sentiment.domain(), self.adapters.sentiment.shutdown().await),
            (self.adapters.chain.domain(), self.adapters.chain.shutdown().await),
            (self.adapters.activity.domain(), self.adapters.activity.shutdown().await),
        ];

        for (domain, result) in results {
            if let Err(failures) = result {
                for (backend, err) in failures {
                    log::warn!("⚠️  Failed to close {} backend {}: {}", domain, backend, err);
                }
            }
        }

        log::info!("🛑 Aggregator shut down");
    }

    async fn bounded<R: DomainRecord>(&self, adapter: &SourceAdapter<R>, selector: &str) -> R {
        match self.tick_deadline {
            None => adapter.fetch_latest(selector).await,
            Some(deadline) => match tokio::time::timeout(deadline, adapter.fetch_latest(selector)).await {
                Ok(record) => record,
                Err(_) => {
                    log::warn!(
                        "⚠️  {} missed the {}ms tick deadline, using fallback",
                        R::DOMAIN,
                        deadline.as_millis()
                    );
                    R::fallback(selector)
                }
            },
        }
    }

    /// Wall-clock stamp clamped to be no earlier than the previous one
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let previous = self.last_stamp_micros.fetch_max(now, Ordering::SeqCst);
        let stamp = now.max(previous);

        Utc.timestamp_micros(stamp).single().unwrap_or_else(Utc::now)
    }
}
