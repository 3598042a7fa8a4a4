//! Statistics and telemetry for relay connections

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-connection telemetry
#[derive(Debug, Clone)]
pub struct Telemetry {
    /// Last time a message was received from or delivered to the client
    pub last_message_at: DateTime<Utc>,
    /// Frames successfully queued to this connection
    pub messages_sent: u64,
    /// Payload bytes successfully queued to this connection
    pub bytes_transferred: u64,
    /// One-way latency estimate (None = no reading)
    pub estimated_latency_ms: Option<u32>,
    /// Deliveries that failed on the server side
    pub dropped_count: u64,
    /// Client-reported playback frame rate
    pub reported_fps: Option<f64>,
    /// Client-reported buffer size
    pub reported_buffer_size: Option<f64>,
    /// Client-reported dropped frames
    pub reported_dropped: Option<u64>,
}

impl Telemetry {
    /// Create telemetry for a freshly connected client
    pub fn new(now: DateTime<Utc>, initial_latency_ms: Option<u32>) -> Self {
        Self {
            last_message_at: now,
            messages_sent: 0,
            bytes_transferred: 0,
            estimated_latency_ms: initial_latency_ms,
            dropped_count: 0,
            reported_fps: None,
            reported_buffer_size: None,
            reported_dropped: None,
        }
    }

    /// Account for a successful delivery
    pub fn record_delivery(&mut self, bytes: usize, now: DateTime<Utc>) {
        self.messages_sent += 1;
        self.bytes_transferred += bytes as u64;
        self.last_message_at = now;
    }

    /// Account for a failed delivery
    pub fn record_drop(&mut self) {
        self.dropped_count += 1;
    }

    /// Merge client-reported fields
    pub fn apply(&mut self, patch: &TelemetryPatch) {
        if let Some(fps) = patch.fps {
            self.reported_fps = Some(fps);
        }
        if let Some(size) = patch.buffer_size {
            self.reported_buffer_size = Some(size);
        }
        if let Some(dropped) = patch.dropped {
            self.reported_dropped = Some(dropped);
        }
    }
}

/// Client-reported telemetry fields carried by a `stats` message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPatch {
    pub fps: Option<f64>,
    pub buffer_size: Option<f64>,
    pub dropped: Option<u64>,
}

/// Aggregate stats embedded in the heartbeat `ping`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeartbeatStats {
    /// Registered connections
    pub connections: usize,
    /// Frames per second relayed over the last sweep window
    pub fps: f64,
}

/// Relay-wide snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayStats {
    /// Registered connections
    pub connections: usize,
    /// Connections that are not sources
    pub viewers: usize,
    /// Rooms with an open source
    pub active_rooms: usize,
    /// Frames fanned out since start
    pub frames_relayed: u64,
    /// Frames fanned out since the last liveness sweep
    pub frames_in_window: u64,
}

/// Frame rate over a window
pub fn frame_rate(frames: u64, window: Duration) -> f64 {
    let secs = window.as_secs_f64();
    if secs > 0.0 {
        frames as f64 / secs
    } else {
        0.0
    }
}
