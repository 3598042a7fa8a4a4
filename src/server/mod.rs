//! WebSocket server: listener, per-socket tasks and the coordinator

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod listener;

pub use config::ServerConfig;
pub use coordinator::{Command, Coordinator, CoordinatorHandle};
pub use listener::RelayServer;
