//! Transport handle
//!
//! A `ClientHandle` is the coordinator's view of one WebSocket: a bounded
//! outbound queue drained by the socket's writer task, plus a cancellation
//! token that lives exactly as long as the connection.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Opaque identity of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Item queued for a connection's writer task
#[derive(Debug, Clone)]
pub enum Outgoing {
    /// UTF-8 text frame (JSON envelope or relayed frame)
    Text(Bytes),
    /// Transport-level ping probe
    Ping,
}

/// Why a send did not reach the outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Transport already closed
    Closed,
    /// Writer is not keeping up; queue is full
    QueueFull,
}

/// Cheap-to-clone handle to a connection's transport
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Outgoing>,
    lifetime: CancellationToken,
}

impl ClientHandle {
    /// Create a handle and the receiver its writer task drains
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Outgoing>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            tx,
            lifetime: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Token cancelled when the connection ends
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    /// Whether the transport is still open
    pub fn is_open(&self) -> bool {
        !self.lifetime.is_cancelled() && !self.tx.is_closed()
    }

    /// Queue an item without waiting
    pub fn send(&self, item: Outgoing) -> Result<(), SendFailure> {
        if !self.is_open() {
            return Err(SendFailure::Closed);
        }
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Queue a text frame
    pub fn send_text(&self, text: impl Into<Bytes>) -> Result<(), SendFailure> {
        self.send(Outgoing::Text(text.into()))
    }

    /// Forcibly close the transport
    pub fn terminate(&self) {
        self.lifetime.cancel();
    }
}
