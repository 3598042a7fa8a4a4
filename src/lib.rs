//! Frame relay
//!
//! A WebSocket relay that forwards frames from one source per room to every
//! viewer in that room. Viewers are served fastest-first in small staggered
//! batches, and a periodic heartbeat evicts connections that stopped
//! answering.
//!
//! # Example
//!
//! ```no_run
//! use frame_relay::{RelayServer, ServerConfig};
//!
//! # async fn run() -> frame_relay::Result<()> {
//! let config = ServerConfig::from_env()?;
//! RelayServer::new(config).run().await
//! # }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use relay::{Relay, RelayConfig};
pub use server::{RelayServer, ServerConfig};
