use meshcall_core::{Identity, Member, RoomId};
use std::collections::BTreeMap;

/// The client's view of who is in its room, fed by relay presence messages.
#[derive(Debug, Default, Clone)]
pub struct RoomRoster {
    room: Option<RoomId>,
    members: BTreeMap<Identity, Member>,
}

impl RoomRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn replace(&mut self, room: RoomId, members: Vec<Member>) {
        self.room = Some(room);
        self.members = members
            .into_iter()
            .map(|m| (m.user_id.clone(), m))
            .collect();
    }

    pub fn insert(&mut self, member: Member) {
        self.members.insert(member.user_id.clone(), member);
    }

    pub fn remove(&mut self, identity: &Identity) -> Option<Member> {
        self.members.remove(identity)
    }

    pub fn clear(&mut self) {
        self.room = None;
        self.members.clear();
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.members.contains_key(identity)
    }

    /// Members ordered by identity.
    pub fn members(&self) -> Vec<Member> {
        self.members.values().cloned().collect()
    }

    /// Everyone but `local`.
    pub fn others(&self, local: &Identity) -> Vec<Identity> {
        self.members
            .keys()
            .filter(|id| *id != local)
            .cloned()
            .collect()
    }
}
