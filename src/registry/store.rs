//! Room/source registry
//!
//! Maps each room to at most one source connection. Stale mappings (source
//! transport already closed) are purged lazily whenever the room is touched,
//! so a dead source never blocks a new registration.

use std::collections::HashMap;

use super::error::RegistryError;
use super::RoomId;
use crate::session::{ClientHandle, ConnectionId};

/// Outcome of a successful source claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Mapping installed for a new source
    Installed,
    /// Caller already owned the room
    Reconfirmed,
}

/// Room -> source mapping
#[derive(Debug, Default)]
pub struct RoomRegistry {
    sources: HashMap<RoomId, ClientHandle>,
}

impl RoomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the source slot of `room` for `handle`
    ///
    /// Fails if another connection with an open transport holds the room.
    pub fn claim(&mut self, room: &str, handle: &ClientHandle) -> Result<Claim, RegistryError> {
        if let Some(existing) = self.sources.get(room) {
            if existing.id() == handle.id() {
                return Ok(Claim::Reconfirmed);
            }
            if existing.is_open() {
                return Err(RegistryError::RoomOccupied(room.to_owned()));
            }
            tracing::debug!(
                room = %room,
                stale = %existing.id(),
                "Purging stale source mapping"
            );
        }

        self.sources.insert(room.to_owned(), handle.clone());
        Ok(Claim::Installed)
    }

    /// Current source of `room` if its transport is open
    ///
    /// A closed mapping is removed as a side effect.
    pub fn live_source(&mut self, room: &str) -> Option<ConnectionId> {
        let open = self.sources.get(room).map(ClientHandle::is_open)?;
        if open {
            self.sources.get(room).map(ClientHandle::id)
        } else {
            if let Some(stale) = self.sources.remove(room) {
                tracing::debug!(room = %room, stale = %stale.id(), "Purged stale source mapping");
            }
            None
        }
    }

    /// Remove the mapping for `room` if it still points at `id`
    pub fn release(&mut self, room: &str, id: ConnectionId) -> bool {
        match self.sources.get(room) {
            Some(existing) if existing.id() == id => {
                self.sources.remove(room);
                true
            }
            Some(existing) => {
                tracing::warn!(
                    room = %room,
                    expected = %existing.id(),
                    actual = %id,
                    "Source release mismatch"
                );
                false
            }
            None => false,
        }
    }

    /// Rooms whose source transport is open, sorted
    pub fn active_rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .sources
            .iter()
            .filter(|(_, handle)| handle.is_open())
            .map(|(room, _)| room.clone())
            .collect();
        rooms.sort();
        rooms
    }

    /// Number of mappings, including stale ones not yet purged
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the registry holds no mappings
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Validate a caller-supplied room id
pub fn require_room_id(room_id: Option<String>) -> Result<RoomId, RegistryError> {
    match room_id {
        Some(room) if !room.is_empty() => Ok(room),
        _ => Err(RegistryError::MissingRoomId),
    }
}
