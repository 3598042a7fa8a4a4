//! Liveness sweep
//!
//! Every heartbeat period each connection must have answered the previous
//! probe with a transport pong. Connections that did not are terminated and
//! removed; the rest are marked unanswered and probed again.

use chrono::{DateTime, Utc};

use crate::protocol::Outbound;
use crate::session::{ConnectionId, Outgoing};
use crate::stats::{frame_rate, HeartbeatStats};

use super::Relay;

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    /// Connections removed for missing the previous probe
    pub evicted: Vec<ConnectionId>,
    /// Connections probed this round
    pub probed: usize,
    /// Frame rate reported in the heartbeat
    pub fps: f64,
}

impl Relay {
    /// Evict unresponsive connections and probe the rest
    pub fn sweep(&mut self, now: DateTime<Utc>) -> SweepOutcome {
        let fps = frame_rate(self.frames_in_window, self.config.heartbeat_interval);
        self.frames_in_window = 0;

        let evicted: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|session| !session.alive)
            .map(|session| session.id())
            .collect();
        for &id in &evicted {
            tracing::info!(connection = %id, "Evicting unresponsive connection");
            self.disconnect(id);
        }

        let heartbeat = Outbound::Ping {
            timestamp: now.timestamp_millis(),
            stats: HeartbeatStats {
                connections: self.connections.len(),
                fps,
            },
        };
        let payload = match heartbeat.encode() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode heartbeat");
                None
            }
        };

        let mut probed = 0;
        for session in self.connections.iter_mut() {
            session.alive = false;
            probed += 1;

            if let Some(payload) = &payload {
                if let Err(failure) = session.handle.send(Outgoing::Text(payload.clone())) {
                    tracing::debug!(connection = %session.id(), failure = ?failure, "Heartbeat not queued");
                }
            }
            if let Err(failure) = session.handle.send(Outgoing::Ping) {
                tracing::debug!(connection = %session.id(), failure = ?failure, "Probe not queued");
            }
        }

        tracing::debug!(
            evicted = evicted.len(),
            probed = probed,
            fps = fps,
            "Liveness sweep"
        );

        SweepOutcome { evicted, probed, fps }
    }
}
