//! Per-connection session record
//!
//! Tracks the role, room and telemetry of a connection from connect to
//! disconnect. Owned by the connection registry; the transport never
//! carries session state itself.

use chrono::{DateTime, Utc};

use super::handle::{ClientHandle, ConnectionId};
use crate::registry::RoomId;
use crate::stats::Telemetry;

/// Role of a connection within its room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connected, not yet in a room
    Unassigned,
    /// Emits frames for its room
    Source,
    /// Receives frames for its room
    Viewer,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Transport handle
    pub handle: ClientHandle,

    /// Current role
    pub role: Role,

    /// Room this connection belongs to
    pub room_id: Option<RoomId>,

    /// Delivery and latency telemetry
    pub telemetry: Telemetry,

    /// Answered the last liveness probe
    pub alive: bool,

    /// Connection start time
    pub connected_at: DateTime<Utc>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(handle: ClientHandle, now: DateTime<Utc>, initial_latency_ms: Option<u32>) -> Self {
        Self {
            handle,
            role: Role::Unassigned,
            room_id: None,
            telemetry: Telemetry::new(now, initial_latency_ms),
            alive: true,
            connected_at: now,
        }
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Whether this connection is a source
    pub fn is_source(&self) -> bool {
        self.role == Role::Source
    }

    /// Whether this connection belongs to `room`
    pub fn in_room(&self, room: &str) -> bool {
        self.room_id.as_deref() == Some(room)
    }

    /// Promote to source of `room`
    pub fn become_source(&mut self, room: RoomId) {
        self.role = Role::Source;
        self.room_id = Some(room);
    }

    /// Join `room` as a viewer
    pub fn join(&mut self, room: RoomId) {
        if self.role == Role::Unassigned {
            self.role = Role::Viewer;
        }
        self.room_id = Some(room);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let (handle, _rx) = ClientHandle::channel(ConnectionId(1), 4);
        let mut state = SessionState::new(handle, Utc::now(), Some(200));

        assert_eq!(state.role, Role::Unassigned);
        assert!(state.alive);
        assert!(state.room_id.is_none());

        state.join("r1".into());
        assert_eq!(state.role, Role::Viewer);
        assert!(state.in_room("r1"));
        assert!(!state.in_room("r2"));
    }

    #[test]
    fn test_become_source() {
        let (handle, _rx) = ClientHandle::channel(ConnectionId(3), 4);
        let mut state = SessionState::new(handle, Utc::now(), Some(200));

        state.become_source("stage".into());

        assert!(state.is_source());
        assert_eq!(state.room_id.as_deref(), Some("stage"));
        assert_eq!(state.id(), ConnectionId(3));
    }
}
