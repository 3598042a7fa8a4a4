//! Relay core: rooms, fan-out, latency and liveness
//!
//! `Relay` is a synchronous state machine. It owns both registries and the
//! frame counters, and is driven one event at a time by the coordinator
//! task, so none of its state needs locking.
//!
//! ```text
//!   socket reader ──► Command ──► Coordinator ──► Relay::dispatch
//!                                     │               ├─► rooms    (register / join / release)
//!   sweeper tick  ──► Command ────────┤               ├─► fanout   (batch 0 inline,
//!                                     │               │             batches 1.. deferred)
//!   deferred batch ─► DeliveryReport ─┘               └─► latency  (ping / pong-response)
//! ```
//!
//! Deferred fan-out batches run as detached tasks holding clones of the
//! viewers' handles. They report each outcome back as a `DeliveryReport`
//! so telemetry is still only touched here.

pub mod config;
pub mod dispatch;
pub mod fanout;
pub mod latency;
pub mod rooms;
pub mod sweeper;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::protocol::Outbound;
use crate::registry::{ConnectionRegistry, RoomRegistry};
use crate::session::{ClientHandle, ConnectionId, SessionState};
use crate::stats::RelayStats;

pub use config::RelayConfig;
pub use fanout::{plan_batches, Batch, DeliveryReport};
pub use sweeper::SweepOutcome;

/// Relay state owned by the coordinator
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    connections: ConnectionRegistry,
    rooms: RoomRegistry,
    reports: mpsc::UnboundedSender<DeliveryReport>,
    frames_in_window: u64,
    frames_relayed: u64,
}

impl Relay {
    /// Create a relay and the receiver for deferred delivery reports
    pub fn new(config: RelayConfig) -> (Self, mpsc::UnboundedReceiver<DeliveryReport>) {
        let (reports, rx) = mpsc::unbounded_channel();
        let relay = Self {
            config,
            connections: ConnectionRegistry::new(),
            rooms: RoomRegistry::new(),
            reports,
            frames_in_window: 0,
            frames_relayed: 0,
        };
        (relay, rx)
    }

    /// Relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Register a connection and return its welcome payload
    pub fn register(&mut self, handle: ClientHandle, now: DateTime<Utc>) -> Outbound {
        let id = handle.id();
        self.connections
            .register(handle, now, self.config.initial_latency_ms);

        Outbound::Info {
            connection_id: id.0,
            rooms: self.rooms.active_rooms(),
            viewers: self.connections.viewer_count(),
        }
    }

    /// Register a connection and send it the welcome payload
    pub fn connect(&mut self, handle: ClientHandle, now: DateTime<Utc>) {
        let id = handle.id();
        let welcome = self.register(handle, now);

        tracing::info!(
            connection = %id,
            connections = self.connections.len(),
            "Client connected"
        );
        self.reply(id, &welcome);
    }

    /// Remove a connection, releasing its room if it was a source
    ///
    /// Returns false if the connection was already gone.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let Some(session) = self.connections.unregister(id) else {
            return false;
        };
        session.handle.terminate();

        if session.is_source() {
            if let Some(room) = session.room_id.as_deref() {
                self.release_source(id, room);
            }
        }

        tracing::info!(
            connection = %id,
            sent = session.telemetry.messages_sent,
            dropped = session.telemetry.dropped_count,
            connections = self.connections.len(),
            "Client disconnected"
        );
        true
    }

    /// Session record of a connection
    pub fn session(&self, id: ConnectionId) -> Option<&SessionState> {
        self.connections.get(id)
    }

    /// Relay-wide snapshot
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.connections.len(),
            viewers: self.connections.viewer_count(),
            active_rooms: self.rooms.active_rooms().len(),
            frames_relayed: self.frames_relayed,
            frames_in_window: self.frames_in_window,
        }
    }

    /// Send an envelope to one connection, logging failures
    fn reply(&self, id: ConnectionId, message: &Outbound) {
        if let Some(session) = self.connections.get(id) {
            send_envelope(&session.handle, message);
        }
    }

    /// Send an envelope to every connection in `room` except `exclude`
    fn broadcast_room(&self, room: &str, exclude: Option<ConnectionId>, message: &Outbound) -> usize {
        let mut recipients = 0;
        for session in self.connections.room_members(room, exclude) {
            send_envelope(&session.handle, message);
            recipients += 1;
        }
        recipients
    }
}

fn send_envelope(handle: &ClientHandle, message: &Outbound) {
    let payload = match message.encode() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode envelope");
            return;
        }
    };
    if let Err(failure) = handle.send_text(payload) {
        tracing::debug!(
            connection = %handle.id(),
            failure = ?failure,
            "Control message not queued"
        );
    }
}
