//! Connection and room/source registries
//!
//! Two maps make up the relay's shared state:
//!
//! ```text
//!        ConnectionRegistry                     RoomRegistry
//!   ┌──────────────────────────┐        ┌────────────────────────┐
//!   │ ConnectionId ->          │        │ RoomId -> ClientHandle │
//!   │   SessionState {         │        │   (the room's source)  │
//!   │     role, room_id,       │◄───────┤                        │
//!   │     telemetry, alive,    │        └────────────────────────┘
//!   │     handle,              │
//!   │   }                      │
//!   └──────────────────────────┘
//! ```
//!
//! Neither map is locked. Both are owned by the relay coordinator and only
//! mutated from its command loop.

pub mod connection;
pub mod error;
pub mod store;

pub use connection::ConnectionRegistry;
pub use error::RegistryError;
pub use store::{require_room_id, Claim, RoomRegistry};

/// Caller-chosen room key
pub type RoomId = String;
