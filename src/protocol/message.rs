//! JSON envelopes exchanged with clients
//!
//! Every control message is a JSON object with a `type` discriminator.
//! Relayed frames are forwarded as the source's original text and never
//! re-encoded.

use std::borrow::Cow;

use bytes::Bytes;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{RegistryError, RoomId};
use crate::stats::{HeartbeatStats, TelemetryPatch};

/// Client -> relay messages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Inbound {
    /// Claim the source slot of a room
    RegisterSource { room_id: Option<String> },
    /// Associate with a room as a viewer
    JoinRoom { room_id: Option<String> },
    /// Media frame from a source; `data` is opaque and only checked for
    /// presence
    Frame { data: Option<IgnoredAny> },
    /// Client clock probe, answered with `pong`
    Ping { timestamp: Option<Value> },
    /// Echo of a heartbeat `ping` timestamp
    PongResponse { server_timestamp: Option<f64> },
    /// Client-side playback telemetry
    Stats(TelemetryPatch),
}

impl Inbound {
    /// Decode an inbound envelope
    ///
    /// Frames are scanned without building a value tree for their payload.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let tag: Tag<'_> = serde_json::from_str(text)?;
        if tag.kind == "frame" {
            let frame: FrameBody = serde_json::from_str(text)?;
            return Ok(Inbound::Frame { data: frame.data });
        }
        serde_json::from_str(text)
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Inbound::RegisterSource { .. } => "register-source",
            Inbound::JoinRoom { .. } => "join-room",
            Inbound::Frame { .. } => "frame",
            Inbound::Ping { .. } => "ping",
            Inbound::PongResponse { .. } => "pong-response",
            Inbound::Stats(_) => "stats",
        }
    }
}

/// Envelope discriminator, other fields skipped
#[derive(Deserialize)]
struct Tag<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
}

#[derive(Deserialize)]
struct FrameBody {
    data: Option<IgnoredAny>,
}

/// Relay -> client messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Outbound {
    /// Welcome payload sent on connect
    Info {
        connection_id: u64,
        rooms: Vec<RoomId>,
        viewers: usize,
    },
    /// Rejected request
    Error { code: &'static str, message: String },
    /// Caller is now the room's source
    SourceRegistered { room_id: RoomId },
    /// Room has a live source
    SourceAvailable { room_id: RoomId },
    /// Room's source went away
    SourceDisconnected { room_id: RoomId },
    /// Reply to a client `ping`
    Pong {
        timestamp: i64,
        client_timestamp: Option<Value>,
    },
    /// Heartbeat probe with relay stats
    Ping {
        timestamp: i64,
        stats: HeartbeatStats,
    },
}

impl Outbound {
    /// Encode as a UTF-8 JSON text payload
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

impl From<&RegistryError> for Outbound {
    fn from(err: &RegistryError) -> Self {
        Outbound::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
