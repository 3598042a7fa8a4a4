//! Connection registry
//!
//! Holds the session record of every live connection, keyed by connection
//! id. Iteration follows id order, so connections that arrived first come
//! first when ties need breaking.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::session::{ClientHandle, ConnectionId, Role, SessionState};
use crate::stats::TelemetryPatch;

/// Live connections and their session state
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: BTreeMap<ConnectionId, SessionState>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with fresh telemetry
    ///
    /// Re-registering an id replaces its previous record.
    pub fn register(
        &mut self,
        handle: ClientHandle,
        now: DateTime<Utc>,
        initial_latency_ms: Option<u32>,
    ) -> &mut SessionState {
        let id = handle.id();
        let session = SessionState::new(handle, now, initial_latency_ms);
        match self.sessions.entry(id) {
            Entry::Occupied(mut entry) => {
                entry.insert(session);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(session),
        }
    }

    /// Remove a connection; `None` if it was already gone
    pub fn unregister(&mut self, id: ConnectionId) -> Option<SessionState> {
        self.sessions.remove(&id)
    }

    /// Look up a session
    pub fn get(&self, id: ConnectionId) -> Option<&SessionState> {
        self.sessions.get(&id)
    }

    /// Look up a session mutably
    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut SessionState> {
        self.sessions.get_mut(&id)
    }

    /// Merge client-reported telemetry; false if the connection is unknown
    pub fn update_telemetry(&mut self, id: ConnectionId, patch: &TelemetryPatch) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.telemetry.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Connections in `room`, excluding `exclude`
    pub fn room_members<'a>(
        &'a self,
        room: &'a str,
        exclude: Option<ConnectionId>,
    ) -> impl Iterator<Item = &'a SessionState> + 'a {
        self.sessions
            .values()
            .filter(move |s| s.in_room(room) && Some(s.id()) != exclude)
    }

    /// All sessions in id order
    pub fn iter(&self) -> impl Iterator<Item = &SessionState> {
        self.sessions.values()
    }

    /// All sessions in id order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SessionState> {
        self.sessions.values_mut()
    }

    /// Connections that are not sources
    pub fn viewer_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.role != Role::Source)
            .count()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no connections are registered
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
