//! Connection session state and transport handles

pub mod handle;
pub mod state;

pub use handle::{ClientHandle, ConnectionId, Outgoing, SendFailure};
pub use state::{Role, SessionState};
