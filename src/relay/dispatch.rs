//! Inbound message routing

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::protocol::Inbound;
use crate::session::ConnectionId;

use super::Relay;

impl Relay {
    /// Decode one inbound message and route it
    ///
    /// Malformed messages are logged and dropped; the connection is left
    /// alone.
    pub fn dispatch(&mut self, id: ConnectionId, payload: Bytes, now: DateTime<Utc>) {
        if self.connections.get(id).is_none() {
            tracing::debug!(connection = %id, "Message from unregistered connection");
            return;
        }

        let message = match std::str::from_utf8(&payload)
            .map_err(|e| e.to_string())
            .and_then(|text| Inbound::decode(text).map_err(|e| e.to_string()))
        {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(
                    connection = %id,
                    bytes = payload.len(),
                    error = %error,
                    "Discarding malformed message"
                );
                return;
            }
        };

        tracing::trace!(connection = %id, kind = message.kind(), "Dispatching");

        match message {
            Inbound::RegisterSource { room_id } => {
                let _ = self.register_source(id, room_id);
            }
            Inbound::JoinRoom { room_id } => {
                let _ = self.join_room(id, room_id);
            }
            Inbound::Frame { data } => {
                let is_source = self
                    .connections
                    .get(id)
                    .is_some_and(|session| session.is_source());
                if !is_source {
                    tracing::debug!(connection = %id, "Ignoring frame from non-source");
                } else if data.is_none() {
                    tracing::warn!(connection = %id, "Frame without data");
                } else {
                    self.fan_out(id, payload, now);
                }
            }
            Inbound::Ping { timestamp } => self.handle_ping(id, timestamp, now),
            Inbound::PongResponse { server_timestamp } => {
                self.handle_pong_response(id, server_timestamp, now);
            }
            Inbound::Stats(patch) => {
                self.connections.update_telemetry(id, &patch);
            }
        }
    }
}
