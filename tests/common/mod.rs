//! Hand-written mocks shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use nexus_broadcaster::records::{
    ActivityRecord, ChainRecord, MacroRecord, PriceRecord, SentimentLabel, SentimentRecord,
};
use nexus_broadcaster::{Backend, FetchError, SourceAdapter, SourceAdapters, TransportError, TransportSink};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

type Responder<R> = Arc<dyn Fn(&str) -> Result<R, FetchError> + Send + Sync>;

/// Counters observed by tests after the backend is boxed into an adapter
#[derive(Clone, Default)]
pub struct BackendStats {
    pub calls: Arc<AtomicUsize>,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub selectors: Arc<Mutex<Vec<String>>>,
}

impl BackendStats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn selectors(&self) -> Vec<String> {
        self.selectors.lock().unwrap().clone()
    }
}

/// Blocks the first fetch until released, announcing when it has started
#[derive(Clone, Default)]
pub struct FetchGate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
    armed: Arc<AtomicBool>,
}

impl FetchGate {
    pub fn new() -> Self {
        let gate = Self::default();
        gate.armed.store(true, Ordering::SeqCst);
        gate
    }
}

pub struct MockBackend<R> {
    name: &'static str,
    respond: Responder<R>,
    delay: Duration,
    fail_close: bool,
    gate: Option<FetchGate>,
    stats: BackendStats,
}

impl<R: Send + 'static> MockBackend<R> {
    pub fn new<F>(name: &'static str, respond: F) -> (Self, BackendStats)
    where
        F: Fn(&str) -> Result<R, FetchError> + Send + Sync + 'static,
    {
        let stats = BackendStats::default();
        let backend = Self {
            name,
            respond: Arc::new(respond),
            delay: Duration::ZERO,
            fail_close: false,
            gate: None,
            stats: stats.clone(),
        };
        (backend, stats)
    }

    pub fn failing(name: &'static str) -> (Self, BackendStats) {
        Self::new(name, |_| Err(FetchError::Status(503)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_gate(mut self, gate: FetchGate) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl<R: Send + 'static> Backend<R> for MockBackend<R> {
    fn name(&self) -> &str {
        self.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self, selector: &str) -> Result<R, FetchError> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        self.stats.selectors.lock().unwrap().push(selector.to_string());

        if let Some(gate) = &self.gate {
            if gate.armed.swap(false, Ordering::SeqCst) {
                gate.started.notify_one();
                gate.release.notified().await;
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        (self.respond)(selector)
    }

    async fn open(&self) -> Result<(), FetchError> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), FetchError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(FetchError::Store("close failed".to_string()));
        }
        Ok(())
    }
}

pub fn price_record(symbol: &str, price: f64) -> PriceRecord {
    PriceRecord {
        symbol: symbol.to_string(),
        price,
        volume: 1_000.0,
        change_24h: 0.5,
        timestamp: Utc::now(),
    }
}

pub fn macro_record(region: &str) -> MacroRecord {
    MacroRecord {
        gdp_growth: Some(1.8),
        inflation_rate: None,
        unemployment_rate: Some(4.1),
        interest_rate: Some(4.33),
        region: region.to_string(),
        timestamp: Utc::now(),
    }
}

pub fn sentiment_record() -> SentimentRecord {
    SentimentRecord {
        sentiment_score: 0.5,
        sentiment_label: SentimentLabel::Positive,
        article_count: 4,
        keywords: vec!["rally".to_string()],
        timestamp: Utc::now(),
    }
}

pub fn chain_record(network: &str) -> ChainRecord {
    ChainRecord {
        network: network.to_string(),
        block_height: 21_000_000,
        transaction_count: 180,
        gas_price: Some(12.5),
        hash_rate: None,
        timestamp: Utc::now(),
    }
}

pub fn activity_record() -> ActivityRecord {
    ActivityRecord {
        active_users: 42,
        transactions_24h: 420,
        total_volume_24h: 4_200.0,
        top_symbols: vec!["ETH/USD".to_string()],
        timestamp: Utc::now(),
    }
}

/// Adapters with no backends: every pass is all fallbacks
pub fn fallback_adapters() -> SourceAdapters {
    SourceAdapters {
        price: SourceAdapter::new(Vec::new()),
        macro_econ: SourceAdapter::new(Vec::new()),
        sentiment: SourceAdapter::new(Vec::new()),
        chain: SourceAdapter::new(Vec::new()),
        activity: SourceAdapter::new(Vec::new()),
    }
}

/// Sink that records every payload it accepts
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub published: Arc<Mutex<Vec<(String, String)>>>,
    pub connects: Arc<AtomicUsize>,
    pub disconnects: Arc<AtomicUsize>,
    /// Number of leading publish calls that fail
    pub fail_first: Arc<AtomicUsize>,
    pub connected: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn failing_first(count: usize) -> Self {
        let sink = Self::default();
        sink.fail_first.store(count, Ordering::SeqCst);
        sink
    }

    pub fn payloads(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportSink for RecordingSink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Publish("channel unavailable".to_string()));
        }

        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "Recording"
    }
}

/// Sink whose connection is always refused
pub struct UnreachableSink;

#[async_trait]
impl TransportSink for UnreachableSink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Connection("connection refused".to_string()))
    }

    async fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "Unreachable"
    }
}

/// Poll `condition` every 5ms until it holds or `limit` elapses
pub async fn wait_until<F: Fn() -> bool>(condition: F, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
