//! Aggregating market-data broadcaster
//!
//! Pulls five independent, unreliable sources (market price, macroeconomic
//! indicators, headline sentiment, blockchain RPC, platform activity), normalizes
//! each into a fixed record, and republishes the combined snapshot on a fixed
//! cadence.
//!
//! ## Module Organization
//!
//! - `records` - Per-domain records, composite record, fallback defaults
//! - `sources` - Per-domain fallback chains and their concrete backends
//! - `aggregator` - Concurrent fan-out over the five adapters
//! - `broadcaster` - Tick loop and lifecycle
//! - `transport` - Redis and JSONL sinks
//! - `config` - Environment configuration

pub mod aggregator;
pub mod broadcaster;
pub mod config;
pub mod records;
pub mod sources;
pub mod transport;

pub use aggregator::{Aggregator, SourceAdapters};
pub use broadcaster::{BroadcastError, BroadcastSettings, Broadcaster, LoopState, StopHandle};
pub use config::{BroadcastConfig, ConfigError, Credentials};
pub use records::{CompositeRecord, Domain, DomainRecord, SCHEMA_VERSION};
pub use sources::{Backend, ChainExhausted, FetchError, SourceAdapter};
pub use transport::{TransportError, TransportSink};
