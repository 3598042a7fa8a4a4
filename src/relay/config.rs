//! Relay core configuration

use std::time::Duration;

/// Tuning for fan-out and liveness
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Period of the liveness sweep
    pub heartbeat_interval: Duration,

    /// Viewers per fan-out batch
    pub batch_size: usize,

    /// Delay added per batch index
    pub batch_stagger: Duration,

    /// Sort key for viewers without a latency reading
    pub unknown_latency_ms: u32,

    /// Latency estimate assigned on connect
    pub initial_latency_ms: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            batch_size: 3,
            batch_stagger: Duration::from_millis(5),
            unknown_latency_ms: 999,
            initial_latency_ms: Some(200),
        }
    }
}

impl RelayConfig {
    /// Set the liveness sweep period
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the fan-out batch size (minimum 1)
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the per-batch delay
    pub fn batch_stagger(mut self, stagger: Duration) -> Self {
        self.batch_stagger = stagger;
        self
    }

    /// Set the latency assigned on connect (None = no reading)
    pub fn initial_latency_ms(mut self, latency: Option<u32>) -> Self {
        self.initial_latency_ms = latency;
        self
    }
}
