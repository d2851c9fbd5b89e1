use std::collections::HashMap;

use synapse_core::net::messages::ConnectionId;

/// A connection currently joined to a room under a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveParticipant {
    pub connection_id: ConnectionId,
    pub display_name: String,
}

/// The live roster of one room, in join order.
#[derive(Debug, Default)]
pub struct LiveSet {
    members: Vec<LiveParticipant>,
}

impl LiveSet {
    /// Insert `connection_id` under `display_name`, evicting any entry that
    /// already holds the same name (a refreshed tab reconnecting) or the same
    /// connection (a rename). Returns the evicted entry of another connection,
    /// if any.
    pub fn upsert_by_name(
        &mut self,
        connection_id: ConnectionId,
        display_name: &str,
    ) -> Option<LiveParticipant> {
        let mut replaced = None;
        self.members.retain(|p| {
            if p.display_name == display_name && p.connection_id != connection_id {
                replaced = Some(p.clone());
                return false;
            }
            p.connection_id != connection_id
        });
        self.members.push(LiveParticipant {
            connection_id,
            display_name: display_name.to_string(),
        });
        replaced
    }

    /// Remove the entry for `connection_id`.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<LiveParticipant> {
        let idx = self
            .members
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        Some(self.members.remove(idx))
    }

    pub fn find(&self, connection_id: ConnectionId) -> Option<&LiveParticipant> {
        self.members
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn names(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|p| p.display_name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Maps room codes to their live rosters. Rooms exist here only while at
/// least one connection is live in them.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, LiveSet>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection in a room, creating the room on first join.
    /// See [`LiveSet::upsert_by_name`] for the replacement rule.
    pub fn join(
        &mut self,
        room_code: &str,
        connection_id: ConnectionId,
        display_name: &str,
    ) -> Option<LiveParticipant> {
        self.rooms
            .entry(room_code.to_string())
            .or_default()
            .upsert_by_name(connection_id, display_name)
    }

    /// Remove a connection from a room. The room entry is dropped once its
    /// roster is empty.
    pub fn leave(
        &mut self,
        room_code: &str,
        connection_id: ConnectionId,
    ) -> Option<LiveParticipant> {
        let set = self.rooms.get_mut(room_code)?;
        let removed = set.remove_connection(connection_id);
        if set.is_empty() {
            self.rooms.remove(room_code);
            tracing::debug!(room = room_code, "Live roster empty, room dropped");
        }
        removed
    }

    /// Remove a connection from every room it is live in. Returns the room
    /// codes and the removed entries.
    pub fn leave_all(&mut self, connection_id: ConnectionId) -> Vec<(String, LiveParticipant)> {
        let codes: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, set)| set.find(connection_id).is_some())
            .map(|(code, _)| code.clone())
            .collect();
        codes
            .into_iter()
            .filter_map(|code| {
                let removed = self.leave(&code, connection_id)?;
                Some((code, removed))
            })
            .collect()
    }

    /// Display names live in a room in join order; empty if the room is unknown.
    pub fn list_names(&self, room_code: &str) -> Vec<String> {
        self.rooms
            .get(room_code)
            .map(LiveSet::names)
            .unwrap_or_default()
    }

    pub fn display_name(&self, room_code: &str, connection_id: ConnectionId) -> Option<&str> {
        self.rooms
            .get(room_code)?
            .find(connection_id)
            .map(|p| p.display_name.as_str())
    }

    pub fn is_live(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }

    /// Number of rooms with at least one live participant.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total live participants across all rooms.
    pub fn participant_count(&self) -> usize {
        self.rooms.values().map(LiveSet::len).sum()
    }
}
