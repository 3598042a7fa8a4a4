//! Round-trip latency estimation
//!
//! Clients answer the heartbeat `ping` with a `pong-response` echoing the
//! server timestamp. Half the round trip becomes the connection's one-way
//! latency estimate, replacing the previous value outright.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::protocol::Outbound;
use crate::session::ConnectionId;

use super::Relay;

/// One-way latency from a server timestamp echoed back at `now_ms`
///
/// Returns `None` for timestamps in the future, not finite, or more than
/// `max_rtt` in the past.
pub fn one_way_latency_ms(server_timestamp_ms: f64, now_ms: i64, max_rtt: Duration) -> Option<u32> {
    let rtt = now_ms as f64 - server_timestamp_ms;
    if !rtt.is_finite() || rtt < 0.0 || rtt > max_rtt.as_millis() as f64 {
        return None;
    }
    Some((rtt / 2.0).round().min(f64::from(u32::MAX)) as u32)
}

impl Relay {
    /// Answer a client `ping` with a `pong`
    pub fn handle_ping(&mut self, id: ConnectionId, client_timestamp: Option<Value>, now: DateTime<Utc>) {
        let Some(session) = self.connections.get_mut(id) else {
            return;
        };
        session.telemetry.last_message_at = now;

        self.reply(
            id,
            &Outbound::Pong {
                timestamp: now.timestamp_millis(),
                client_timestamp,
            },
        );
    }

    /// Update the latency estimate from a `pong-response`
    pub fn handle_pong_response(
        &mut self,
        id: ConnectionId,
        server_timestamp: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<u32> {
        // Unanswered heartbeats are evicted within two periods
        let max_rtt = self.config.heartbeat_interval * 2;
        let session = self.connections.get_mut(id)?;
        let Some(latency) = server_timestamp
            .and_then(|ts| one_way_latency_ms(ts, now.timestamp_millis(), max_rtt))
        else {
            tracing::debug!(
                connection = %id,
                server_timestamp = ?server_timestamp,
                "Ignoring unusable pong-response"
            );
            return None;
        };

        session.telemetry.estimated_latency_ms = Some(latency);
        tracing::trace!(connection = %id, latency_ms = latency, "Latency updated");
        Some(latency)
    }

    /// Mark a connection alive after a transport-level pong
    pub fn handle_transport_pong(&mut self, id: ConnectionId) {
        if let Some(session) = self.connections.get_mut(id) {
            session.alive = true;
        }
    }
}
