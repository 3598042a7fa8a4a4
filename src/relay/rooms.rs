//! Source registration, room membership and source release

use crate::protocol::Outbound;
use crate::registry::{require_room_id, Claim, RegistryError};
use crate::session::ConnectionId;

use super::Relay;

impl Relay {
    /// Make `id` the source of a room
    ///
    /// On success the caller gets `source-registered` and, for a new
    /// mapping, every other connection in the room gets `source-available`.
    /// On failure the caller gets an `error` envelope and nothing changes.
    pub fn register_source(
        &mut self,
        id: ConnectionId,
        room_id: Option<String>,
    ) -> Result<Claim, RegistryError> {
        let result = self.try_register_source(id, room_id);
        if let Err(ref e) = result {
            tracing::warn!(connection = %id, error = %e, "Source registration rejected");
            self.reply(id, &Outbound::from(e));
        }
        result
    }

    fn try_register_source(
        &mut self,
        id: ConnectionId,
        room_id: Option<String>,
    ) -> Result<Claim, RegistryError> {
        let room = require_room_id(room_id)?;
        let session = self
            .connections
            .get(id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        if session.is_source() {
            if let Some(current) = session.room_id.as_deref().filter(|r| *r != room) {
                return Err(RegistryError::AlreadySource(current.to_owned()));
            }
        }

        let handle = session.handle.clone();
        let claim = self.rooms.claim(&room, &handle)?;

        if let Some(session) = self.connections.get_mut(id) {
            session.become_source(room.clone());
        }
        self.reply(
            id,
            &Outbound::SourceRegistered {
                room_id: room.clone(),
            },
        );

        if claim == Claim::Installed {
            let notified = self.broadcast_room(
                &room,
                Some(id),
                &Outbound::SourceAvailable {
                    room_id: room.clone(),
                },
            );
            tracing::info!(
                connection = %id,
                room = %room,
                notified = notified,
                "Source registered"
            );
        }

        Ok(claim)
    }

    /// Associate `id` with a room as a viewer
    ///
    /// If the room already has a live source the caller is told right away.
    pub fn join_room(
        &mut self,
        id: ConnectionId,
        room_id: Option<String>,
    ) -> Result<(), RegistryError> {
        let result = self.try_join_room(id, room_id);
        if let Err(ref e) = result {
            tracing::warn!(connection = %id, error = %e, "Join rejected");
            self.reply(id, &Outbound::from(e));
        }
        result
    }

    fn try_join_room(&mut self, id: ConnectionId, room_id: Option<String>) -> Result<(), RegistryError> {
        let room = require_room_id(room_id)?;
        let session = self
            .connections
            .get_mut(id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        if session.is_source() {
            let current = session.room_id.clone().unwrap_or_default();
            return Err(RegistryError::AlreadySource(current));
        }
        session.join(room.clone());

        let source = self.rooms.live_source(&room);
        tracing::debug!(
            connection = %id,
            room = %room,
            source = ?source,
            "Joined room"
        );

        if source.is_some_and(|source| source != id) {
            self.reply(id, &Outbound::SourceAvailable { room_id: room });
        }
        Ok(())
    }

    /// Drop the room mapping held by `id` and tell the room
    ///
    /// Does nothing if the room has since been claimed by another source.
    pub fn release_source(&mut self, id: ConnectionId, room: &str) -> bool {
        if !self.rooms.release(room, id) {
            return false;
        }

        let notified = self.broadcast_room(
            room,
            Some(id),
            &Outbound::SourceDisconnected {
                room_id: room.to_owned(),
            },
        );
        tracing::info!(
            connection = %id,
            room = %room,
            notified = notified,
            "Source released"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::{Claim, RegistryError};
    use crate::relay::testing::*;
    use crate::session::Role;

    #[test]
    fn test_register_source_confirms_and_notifies() {
        let mut relay = relay();
        let mut viewer = connect(&mut relay, 1);
        let mut other_room = connect(&mut relay, 2);
        let mut source = connect(&mut relay, 3);

        relay.join_room(viewer.id, Some("r1".into())).unwrap();
        relay.join_room(other_room.id, Some("r2".into())).unwrap();
        viewer.drain();

        assert_eq!(
            relay.register_source(source.id, Some("r1".into())),
            Ok(Claim::Installed)
        );

        let confirm = source.drain_json();
        assert_eq!(confirm.len(), 1);
        assert_eq!(confirm[0]["type"], "source-registered");
        assert_eq!(confirm[0]["roomId"], "r1");

        let notices = viewer.drain_json();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0]["type"], "source-available");
        assert_eq!(notices[0]["roomId"], "r1");

        assert!(other_room.drain().is_empty());
        assert_eq!(relay.session(source.id).unwrap().role, Role::Source);
    }

    #[test]
    fn test_missing_room_id() {
        let mut relay = relay();
        let mut client = connect(&mut relay, 1);

        assert_eq!(
            relay.register_source(client.id, None),
            Err(RegistryError::MissingRoomId)
        );
        assert_eq!(
            relay.register_source(client.id, Some(String::new())),
            Err(RegistryError::MissingRoomId)
        );
        assert_eq!(relay.join_room(client.id, None), Err(RegistryError::MissingRoomId));

        let replies = client.drain_json();
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|r| r["type"] == "error" && r["code"] == "missing-room-id"));

        let session = relay.session(client.id).unwrap();
        assert_eq!(session.role, Role::Unassigned);
        assert!(session.room_id.is_none());
    }

    #[test]
    fn test_second_source_rejected() {
        let mut relay = relay();
        let mut first = connect(&mut relay, 1);
        let mut second = connect(&mut relay, 2);

        relay.register_source(first.id, Some("r1".into())).unwrap();
        first.drain();

        assert_eq!(
            relay.register_source(second.id, Some("r1".into())),
            Err(RegistryError::RoomOccupied("r1".into()))
        );

        let replies = second.drain_json();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(replies[0]["code"], "room-occupied");

        // Existing source is untouched and hears nothing
        assert_eq!(relay.session(first.id).unwrap().role, Role::Source);
        assert_eq!(relay.session(second.id).unwrap().role, Role::Unassigned);
        assert!(first.drain().is_empty());
    }

    #[test]
    fn test_stale_source_replaced() {
        let mut relay = relay();
        let first = connect(&mut relay, 1);
        let mut second = connect(&mut relay, 2);

        relay.register_source(first.id, Some("r1".into())).unwrap();
        // Transport closed, close event not processed yet
        first.handle.terminate();

        assert_eq!(
            relay.register_source(second.id, Some("r1".into())),
            Ok(Claim::Installed)
        );
        assert_eq!(second.drain_types(), vec!["source-registered"]);

        // The old source's late disconnect must not free the new source's room
        relay.disconnect(first.id);
        assert_eq!(relay.stats().active_rooms, 1);
    }

    #[test]
    fn test_source_reregisters_own_room() {
        let mut relay = relay();
        let mut source = connect(&mut relay, 1);
        let mut viewer = connect(&mut relay, 2);

        relay.join_room(viewer.id, Some("r1".into())).unwrap();
        relay.register_source(source.id, Some("r1".into())).unwrap();
        viewer.drain();
        source.drain();

        assert_eq!(
            relay.register_source(source.id, Some("r1".into())),
            Ok(Claim::Reconfirmed)
        );
        assert_eq!(source.drain_types(), vec!["source-registered"]);
        assert!(viewer.drain().is_empty());

        assert_eq!(
            relay.register_source(source.id, Some("r2".into())),
            Err(RegistryError::AlreadySource("r1".into()))
        );
        assert_eq!(relay.join_room(source.id, Some("r2".into())), Err(RegistryError::AlreadySource("r1".into())));
        assert_eq!(relay.session(source.id).unwrap().room_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_join_room_with_live_source() {
        let mut relay = relay();
        let mut source = connect(&mut relay, 1);
        let mut viewer = connect(&mut relay, 2);

        relay.register_source(source.id, Some("r1".into())).unwrap();
        source.drain();

        relay.join_room(viewer.id, Some("r1".into())).unwrap();

        let notices = viewer.drain_json();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0]["type"], "source-available");
        assert_eq!(notices[0]["roomId"], "r1");
        assert_eq!(relay.session(viewer.id).unwrap().role, Role::Viewer);
    }

    #[test]
    fn test_join_room_purges_stale_silently() {
        let mut relay = relay();
        let source = connect(&mut relay, 1);
        let mut viewer = connect(&mut relay, 2);

        relay.register_source(source.id, Some("r1".into())).unwrap();
        source.handle.terminate();

        relay.join_room(viewer.id, Some("r1".into())).unwrap();

        assert!(viewer.drain().is_empty());
        assert_eq!(relay.stats().active_rooms, 0);
    }

    #[test]
    fn test_source_disconnect_notifies_room_once() {
        let mut relay = relay();
        let source = connect(&mut relay, 1);
        let mut viewers: Vec<_> = (2..=4).map(|id| connect(&mut relay, id)).collect();
        let mut outsider = connect(&mut relay, 5);

        for viewer in &viewers {
            relay.join_room(viewer.id, Some("r1".into())).unwrap();
        }
        relay.join_room(outsider.id, Some("r2".into())).unwrap();
        relay.register_source(source.id, Some("r1".into())).unwrap();
        for viewer in &mut viewers {
            viewer.drain();
        }

        assert!(relay.disconnect(source.id));
        assert!(!relay.disconnect(source.id));

        for viewer in &mut viewers {
            let notices = viewer.drain_json();
            assert_eq!(notices.len(), 1);
            assert_eq!(notices[0]["type"], "source-disconnected");
            assert_eq!(notices[0]["roomId"], "r1");
        }
        assert!(outsider.drain().is_empty());

        // Room is free again
        let mut next = connect(&mut relay, 6);
        assert_eq!(
            relay.register_source(next.id, Some("r1".into())),
            Ok(Claim::Installed)
        );
        assert_eq!(next.drain_types(), vec!["source-registered"]);
    }

    #[test]
    fn test_viewer_disconnect_is_quiet() {
        let mut relay = relay();
        let mut source = connect(&mut relay, 1);
        let viewer = connect(&mut relay, 2);

        relay.register_source(source.id, Some("r1".into())).unwrap();
        relay.join_room(viewer.id, Some("r1".into())).unwrap();
        source.drain();

        relay.disconnect(viewer.id);

        assert!(source.drain().is_empty());
        assert_eq!(relay.stats().active_rooms, 1);
    }
}
