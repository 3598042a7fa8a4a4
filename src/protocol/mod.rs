//! Wire protocol: JSON control envelopes

pub mod message;

pub use message::{Inbound, Outbound};
