//! Connection telemetry and relay-wide statistics

pub mod metrics;

pub use metrics::{frame_rate, HeartbeatStats, RelayStats, Telemetry, TelemetryPatch};
