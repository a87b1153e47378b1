use crate::registry::connection::{ConnectionId, Participant};
use dashmap::DashMap;
use meshcall_core::{Identity, Member, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {connection} is already a member of room '{room}'")]
    AlreadyInRoom {
        connection: ConnectionId,
        room: RoomId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// Membership after the join, sorted by identity.
    pub members: Vec<Member>,
    /// The identity had no other connection in the room before this join.
    pub first_connection: bool,
    /// The same connection was already a member; nothing changed.
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    NotMember,
    Left {
        member: Member,
        /// No connection of this identity remains in the room.
        last_connection: bool,
    },
}

#[derive(Debug, Default)]
struct MemberEntry {
    username: String,
    /// In join order.
    connections: Vec<ConnectionId>,
}

#[derive(Debug, Default)]
struct RoomMembership {
    members: HashMap<Identity, MemberEntry>,
}

impl RoomMembership {
    fn snapshot(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .map(|(identity, entry)| Member::new(identity.clone(), entry.username.clone()))
            .collect();
        members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        members
    }

    fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Who is present in which room. Safe to share between connection tasks;
/// each room is guarded by its own map shard, there is no global lock.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomMembership>>,
    locations: Arc<DashMap<ConnectionId, RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the participant's connection to the room.
    ///
    /// Joining the same room twice from one connection is a no-op that reports
    /// `duplicate`. A connection may only be present in one room at a time.
    pub fn join(&self, room: &RoomId, participant: Participant) -> Result<JoinOutcome, RegistryError> {
        let Participant { connection, member } = participant;

        if let Some(current) = self.locations.get(&connection) {
            if current.value() != room {
                return Err(RegistryError::AlreadyInRoom {
                    connection,
                    room: current.value().clone(),
                });
            }
        }

        let mut membership = self.rooms.entry(room.clone()).or_default();
        let entry = membership.members.entry(member.user_id.clone()).or_default();

        let first_connection = entry.connections.is_empty();
        let duplicate = entry.connections.contains(&connection);
        if !duplicate {
            entry.connections.push(connection);
        }
        entry.username = member.username;

        let members = membership.snapshot();
        drop(membership);

        self.locations.insert(connection, room.clone());

        debug!(
            "Join {} -> '{}' (first: {}, duplicate: {})",
            connection, room, first_connection, duplicate
        );

        Ok(JoinOutcome {
            members,
            first_connection,
            duplicate,
        })
    }

    /// Removes the connection from the room. Absent connections are a no-op.
    pub fn leave(&self, room: &RoomId, connection: ConnectionId) -> LeaveOutcome {
        let outcome = {
            let Some(mut membership) = self.rooms.get_mut(room) else {
                return LeaveOutcome::NotMember;
            };

            let found = membership
                .members
                .iter_mut()
                .find(|(_, entry)| entry.connections.contains(&connection))
                .map(|(identity, entry)| {
                    entry.connections.retain(|c| *c != connection);
                    (identity.clone(), entry.username.clone(), entry.connections.is_empty())
                });

            let Some((identity, username, last_connection)) = found else {
                return LeaveOutcome::NotMember;
            };

            if last_connection {
                membership.members.remove(&identity);
            }

            LeaveOutcome::Left {
                member: Member::new(identity, username),
                last_connection,
            }
        };

        self.locations.remove_if(&connection, |_, current| current == room);
        self.rooms.remove_if(room, |_, membership| membership.is_empty());

        outcome
    }

    pub fn members_of(&self, room: &RoomId) -> Vec<Member> {
        self.rooms
            .get(room)
            .map(|membership| membership.snapshot())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.locations.get(&connection).map(|room| room.value().clone())
    }

    /// The connection that receives directed signaling for `identity`: the
    /// earliest of its connections still in the room.
    pub fn signaling_connection(&self, room: &RoomId, identity: &Identity) -> Option<ConnectionId> {
        self.rooms.get(room).and_then(|membership| {
            membership
                .members
                .get(identity)
                .and_then(|entry| entry.connections.first().copied())
        })
    }

    /// Every connection currently in the room, across all identities.
    pub fn room_connections(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|membership| {
                membership
                    .members
                    .values()
                    .flat_map(|entry| entry.connections.iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
