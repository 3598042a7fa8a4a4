//! Property-based tests for room source exclusivity

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use frame_relay::registry::{Claim, RegistryError};
use frame_relay::session::{ClientHandle, ConnectionId, Outgoing};
use frame_relay::{Relay, RelayConfig};
use proptest::prelude::*;
use tokio::sync::mpsc;

const CLIENTS: u64 = 6;
const ROOMS: [&str; 3] = ["r1", "r2", "r3"];

#[derive(Debug, Clone)]
enum Op {
    Register(u64, usize),
    Join(u64, usize),
    Terminate(u64),
    Disconnect(u64),
    Reconnect(u64),
}

fn op() -> impl Strategy<Value = Op> {
    let client = 1..=CLIENTS;
    let room = 0..ROOMS.len();
    prop_oneof![
        4 => (client.clone(), room.clone()).prop_map(|(c, r)| Op::Register(c, r)),
        3 => (client.clone(), room).prop_map(|(c, r)| Op::Join(c, r)),
        1 => client.clone().prop_map(Op::Terminate),
        1 => client.clone().prop_map(Op::Disconnect),
        1 => client.prop_map(Op::Reconnect),
    ]
}

struct Harness {
    relay: Relay,
    handles: HashMap<u64, ClientHandle>,
    receivers: HashMap<u64, mpsc::Receiver<Outgoing>>,
    next_id: u64,
}

impl Harness {
    fn new() -> Self {
        let (relay, _reports) = Relay::new(RelayConfig::default());
        let mut harness = Self {
            relay,
            handles: HashMap::new(),
            receivers: HashMap::new(),
            next_id: 1,
        };
        for slot in 1..=CLIENTS {
            harness.connect(slot);
        }
        harness
    }

    /// Connect a fresh client into `slot`
    fn connect(&mut self, slot: u64) {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let (handle, rx) = ClientHandle::channel(id, 4096);
        self.relay.connect(handle.clone(), Utc::now());
        self.handles.insert(slot, handle);
        self.receivers.insert(slot, rx);
    }

    fn id(&self, slot: u64) -> ConnectionId {
        self.handles[&slot].id()
    }

    fn apply(&mut self, op: &Op) -> Option<Result<Claim, RegistryError>> {
        match *op {
            Op::Register(slot, room) => {
                let id = self.id(slot);
                Some(self.relay.register_source(id, Some(ROOMS[room].to_owned())))
            }
            Op::Join(slot, room) => {
                let id = self.id(slot);
                let _ = self.relay.join_room(id, Some(ROOMS[room].to_owned()));
                None
            }
            Op::Terminate(slot) => {
                self.handles[&slot].terminate();
                None
            }
            Op::Disconnect(slot) => {
                let id = self.id(slot);
                self.relay.disconnect(id);
                None
            }
            Op::Reconnect(slot) => {
                let id = self.id(slot);
                self.relay.disconnect(id);
                self.connect(slot);
                None
            }
        }
    }

    /// Rooms with an open source, each with the sources claiming it
    fn open_sources(&self) -> HashMap<String, Vec<ConnectionId>> {
        let mut sources: HashMap<String, Vec<ConnectionId>> = HashMap::new();
        for handle in self.handles.values() {
            let Some(session) = self.relay.session(handle.id()) else {
                continue;
            };
            if session.is_source() && session.handle.is_open() {
                if let Some(room) = &session.room_id {
                    sources.entry(room.clone()).or_default().push(handle.id());
                }
            }
        }
        sources
    }
}

/// Property: no room ever has two open sources
#[test]
fn prop_at_most_one_open_source_per_room() {
    proptest!(|(ops in prop::collection::vec(op(), 1..60))| {
        let mut harness = Harness::new();

        for op in &ops {
            harness.apply(op);

            for (room, sources) in harness.open_sources() {
                prop_assert!(
                    sources.len() <= 1,
                    "room {} has sources {:?} after {:?}",
                    room,
                    sources,
                    op
                );
            }
        }
    });
}

/// Property: active room count matches the rooms with an open source
#[test]
fn prop_active_rooms_match_open_sources() {
    proptest!(|(ops in prop::collection::vec(op(), 1..60))| {
        let mut harness = Harness::new();

        for op in &ops {
            harness.apply(op);
        }

        let open: HashSet<String> = harness.open_sources().into_keys().collect();
        prop_assert_eq!(harness.relay.stats().active_rooms, open.len());
    });
}

/// Property: a rejected registration never changes the caller's role
#[test]
fn prop_rejected_registration_is_side_effect_free() {
    proptest!(|(ops in prop::collection::vec(op(), 1..40), slot in 1..=CLIENTS, room in 0..ROOMS.len())| {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
        }

        let id = harness.id(slot);
        let before = harness.relay.session(id).map(|s| (s.role, s.room_id.clone()));

        if let Some(Err(_)) = harness.apply(&Op::Register(slot, room)) {
            let after = harness.relay.session(id).map(|s| (s.role, s.room_id.clone()));
            prop_assert_eq!(before, after);
        }
    });
}
