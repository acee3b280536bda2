//! Publisher loop
//!
//! Drives the tick cadence: aggregate, serialize, publish, wait. The wait is
//! paced from the start of the previous tick and wakes early on `stop()`.
//! A tick already in flight when `stop()` is called still publishes; nothing
//! is published after the loop observes the stop.
//!
//! Per-tick failures (serialization, delivery) are logged and the loop moves
//! on. Only failing to connect the sink at startup is fatal.

use crate::aggregator::Aggregator;
use crate::config::{BroadcastConfig, ConfigError};
use crate::transport::{sink_from_config, TransportError, TransportSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Not started yet
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
pub enum BroadcastError {
    Connect(TransportError),
    AlreadyStarted,
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BroadcastError::Connect(e) => write!(f, "Failed to connect sink: {}", e),
            BroadcastError::AlreadyStarted => write!(f, "Broadcaster was already started"),
        }
    }
}

impl std::error::Error for BroadcastError {}

/// Cloneable handle that stops a running loop from any task
#[derive(Clone)]
pub struct StopHandle {
    state: Arc<watch::Sender<LoopState>>,
}

impl StopHandle {
    /// Request the loop to stop. Safe to call repeatedly, before start, or after exit.
    pub fn stop(&self) {
        let previous = self.state.send_replace(LoopState::Stopped);
        if previous == LoopState::Running {
            log::info!("🛑 Stop requested, finishing current tick");
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }
}

/// Loop parameters
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub topic: String,
    pub interval: Duration,
    pub region: String,
    pub network: String,
}

impl BroadcastSettings {
    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self {
            topic: config.topic.clone(),
            interval: config.interval(),
            region: config.region.clone(),
            network: config.network.clone(),
        }
    }
}

pub struct Broadcaster {
    aggregator: Aggregator,
    sink: Box<dyn TransportSink>,
    settings: BroadcastSettings,
    state: Arc<watch::Sender<LoopState>>,
    started: bool,
}

impl Broadcaster {
    pub fn new(aggregator: Aggregator, sink: Box<dyn TransportSink>, settings: BroadcastSettings) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);

        Self {
            aggregator,
            sink,
            settings,
            state: Arc::new(state),
            started: false,
        }
    }

    /// Production wiring: sink by URL scheme, adapters from credentials
    pub fn from_config(config: &BroadcastConfig) -> Result<Self, ConfigError> {
        let sink = sink_from_config(config)?;
        Ok(Self::new(
            Aggregator::from_config(config),
            sink,
            BroadcastSettings::from_config(config),
        ))
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn settings(&self) -> &BroadcastSettings {
        &self.settings
    }

    /// Run until stopped. Returns the number of records published.
    pub async fn start(&mut self) -> Result<u64, BroadcastError> {
        if self.started {
            return Err(BroadcastError::AlreadyStarted);
        }
        self.started = true;

        log::info!("🔗 Connecting {} sink", self.sink.sink_type());
        if let Err(e) = self.sink.connect().await {
            log::error!("❌ Failed to connect {} sink: {}", self.sink.sink_type(), e);
            self.state.send_replace(LoopState::Stopped);
            return Err(BroadcastError::Connect(e));
        }

        self.aggregator.initialize().await;

        // An early stop() wins over start
        self.state.send_if_modified(|state| {
            if *state == LoopState::Idle {
                *state = LoopState::Running;
                true
            } else {
                false
            }
        });

        log::info!("🚀 Broadcasting to '{}'", self.settings.topic);
        log::info!("   ├─ Sink: {}", self.sink.sink_type());
        log::info!("   └─ Interval: {}ms", self.settings.interval.as_millis());

        let published = self.run_loop().await;

        self.aggregator.shutdown().await;
        if let Err(e) = self.sink.disconnect().await {
            log::error!("❌ Failed to disconnect {} sink: {}", self.sink.sink_type(), e);
        }
        self.state.send_replace(LoopState::Stopped);

        log::info!("✅ Broadcaster stopped after {} publishes", published);
        Ok(published)
    }

    async fn run_loop(&mut self) -> u64 {
        let mut state = self.state.subscribe();
        let mut timer = tokio::time::interval(self.settings.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut published = 0u64;

        loop {
            if *state.borrow_and_update() != LoopState::Running {
                break;
            }

            // A pending stop wins over a ready timer
            tokio::select! {
                biased;
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = timer.tick() => {}
            }

            if *state.borrow() != LoopState::Running {
                break;
            }

            if self.tick().await {
                published += 1;
            }
        }

        published
    }

    /// One aggregation and publish. Returns whether the record was delivered.
    async fn tick(&mut self) -> bool {
        let record = self
            .aggregator
            .aggregate(&self.settings.region, &self.settings.network)
            .await;

        let payload = match record.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("❌ Failed to serialize composite record: {}", e);
                return false;
            }
        };

        match self.sink.publish(&self.settings.topic, &payload).await {
            Ok(()) => {
                log::debug!(
                    "📡 Published composite record ({} bytes) to '{}'",
                    payload.len(),
                    self.settings.topic
                );
                true
            }
            Err(e) => {
                log::error!("❌ Failed to publish to '{}': {}", self.settings.topic, e);
                false
            }
        }
    }
}
