//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::relay::RelayConfig;

/// Port used when `PORT` is not set
pub const DEFAULT_PORT: u16 = 8765;

/// Inbound message cap enforced by the WebSocket layer
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Largest inbound message accepted
    pub max_message_size: usize,

    /// Outbound queue depth per connection
    pub outbound_queue: usize,

    /// Coordinator command queue depth
    pub command_queue: usize,

    /// Fan-out and liveness tuning
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_queue: 256,
            command_queue: 1024,
            relay: RelayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("PORT") {
            let port = raw
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("PORT={raw:?}: {e}")))?;
            config.bind_addr.set_port(port);
        }

        Ok(config)
    }

    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the inbound message cap
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the per-connection outbound queue depth
    pub fn outbound_queue(mut self, depth: usize) -> Self {
        self.outbound_queue = depth.max(1);
        self
    }

    /// Replace the relay tuning
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }
}
