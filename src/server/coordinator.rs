//! Relay coordinator task
//!
//! The single owner of relay state. Socket tasks and the sweeper timer send
//! it `Command`s; it applies them one at a time, in arrival order. That
//! ordering is what makes two racing `register-source` requests resolve as
//! first-writer-wins without any locks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::relay::{DeliveryReport, Relay};
use crate::server::config::ServerConfig;
use crate::session::{ClientHandle, ConnectionId, Outgoing};
use crate::stats::RelayStats;

/// Work item for the coordinator
#[derive(Debug)]
pub enum Command {
    /// Transport connected
    Connect(ClientHandle),
    /// Text or binary message from a client
    Message { id: ConnectionId, payload: Bytes },
    /// Transport-level pong from a client
    TransportPong(ConnectionId),
    /// Transport closed or errored
    Disconnect(ConnectionId),
    /// Liveness sweep tick
    Sweep,
    /// Stats snapshot request
    Stats(oneshot::Sender<RelayStats>),
}

/// Cloneable sender side of the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
    next_connection_id: Arc<AtomicU64>,
    outbound_queue: usize,
}

impl CoordinatorHandle {
    /// Allocate a connection id and its transport handle
    pub fn open_connection(&self) -> (ClientHandle, mpsc::Receiver<Outgoing>) {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        ClientHandle::channel(id, self.outbound_queue)
    }

    /// Register a connected client
    pub async fn connect(&self, handle: ClientHandle) -> Result<()> {
        self.send(Command::Connect(handle)).await
    }

    /// Forward an inbound message
    pub async fn message(&self, id: ConnectionId, payload: Bytes) -> Result<()> {
        self.send(Command::Message { id, payload }).await
    }

    /// Report a transport pong
    pub async fn transport_pong(&self, id: ConnectionId) -> Result<()> {
        self.send(Command::TransportPong(id)).await
    }

    /// Report a closed transport
    pub async fn disconnect(&self, id: ConnectionId) -> Result<()> {
        self.send(Command::Disconnect(id)).await
    }

    /// Run a liveness sweep now
    pub async fn sweep(&self) -> Result<()> {
        self.send(Command::Sweep).await
    }

    /// Snapshot relay stats
    pub async fn stats(&self) -> Result<RelayStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats(reply)).await?;
        rx.await.map_err(|_| Error::CoordinatorClosed)
    }

    /// Spawn the periodic liveness sweep
    ///
    /// The first sweep runs one full `interval` after spawning.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let handle = self.clone();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                if handle.sweep().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| Error::CoordinatorClosed)
    }
}

/// Coordinator task state
pub struct Coordinator {
    relay: Relay,
    commands: mpsc::Receiver<Command>,
    reports: mpsc::UnboundedReceiver<DeliveryReport>,
}

impl Coordinator {
    /// Create a coordinator and its handle
    pub fn new(config: &ServerConfig) -> (Self, CoordinatorHandle) {
        let (tx, commands) = mpsc::channel(config.command_queue.max(1));
        let (relay, reports) = Relay::new(config.relay.clone());

        let coordinator = Self {
            relay,
            commands,
            reports,
        };
        let handle = CoordinatorHandle {
            tx,
            next_connection_id: Arc::new(AtomicU64::new(1)),
            outbound_queue: config.outbound_queue,
        };
        (coordinator, handle)
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                Some(report) = self.reports.recv() => self.relay.record_delivery(report),
            }
        }
        tracing::debug!("Coordinator stopped");
    }

    fn apply(&mut self, command: Command) {
        let now = Utc::now();
        match command {
            Command::Connect(handle) => self.relay.connect(handle, now),
            Command::Message { id, payload } => self.relay.dispatch(id, payload, now),
            Command::TransportPong(id) => self.relay.handle_transport_pong(id),
            Command::Disconnect(id) => {
                self.relay.disconnect(id);
            }
            Command::Sweep => {
                self.relay.sweep(now);
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.relay.stats());
            }
        }
    }
}
