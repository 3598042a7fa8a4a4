//! Registry error types
//!
//! Error types for room/source registry operations. Each variant maps to a
//! stable `code` sent to the client in an `error` envelope.

use super::RoomId;
use crate::session::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// `roomId` was missing or empty
    #[error("roomId is required")]
    MissingRoomId,
    /// Room already has a source with an open transport
    #[error("room {0} already has an active source")]
    RoomOccupied(RoomId),
    /// Connection is already the source of another room
    #[error("connection is already the source of room {0}")]
    AlreadySource(RoomId),
    /// Connection is not registered
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

impl RegistryError {
    /// Wire code for the `error` envelope
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::MissingRoomId => "missing-room-id",
            RegistryError::RoomOccupied(_) => "room-occupied",
            RegistryError::AlreadySource(_) => "already-source",
            RegistryError::UnknownConnection(_) => "unknown-connection",
        }
    }
}
