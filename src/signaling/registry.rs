use std::collections::HashMap;

use tracing::debug;

use super::error::{Error, Result};
use super::peer::PeerId;
use super::room::{Room, RoomId, RoomName};

/// Outcome of a successful join.
#[derive(Debug, PartialEq, Eq)]
pub struct Joined {
  pub room_id: RoomId,
  /// Members present before the join, in join order.
  pub existing: Vec<PeerId>,
}

/// Outcome of a successful leave.
#[derive(Debug, PartialEq, Eq)]
pub struct Left {
  pub room_id: RoomId,
  /// Members still in the room. Empty when the room was destroyed.
  pub remaining: Vec<PeerId>,
}

/// In-memory room state: rooms by id, the name index and the membership index.
///
/// All three maps are only ever mutated together inside a single method call, so callers that
/// serialize access (see `Signaling`) observe them consistent at all times.
#[derive(Debug, Default)]
pub struct Registry {
  rooms: HashMap<RoomId, Room>,
  names: HashMap<RoomName, RoomId>,
  memberships: HashMap<PeerId, RoomId>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn join(&mut self, peer_id: PeerId, room_name: RoomName) -> Result<Joined> {
    if let Some(room_id) = self.memberships.get(&peer_id) {
      return Err(Error::AlreadyJoined { peer: peer_id, room: *room_id });
    }

    let room_id = *self.names.entry(room_name.clone()).or_insert_with(RoomId::new);
    let room = self.rooms.entry(room_id).or_insert_with(|| {
      debug!("create room room_id={room_id} name={room_name}");
      Room::new(room_id, room_name)
    });
    let existing = room.members.clone();
    room.members.push(peer_id);
    self.memberships.insert(peer_id, room_id);

    Ok(Joined { room_id, existing })
  }

  pub fn relay_target(&self, peer_id: PeerId) -> Result<RoomId> {
    self.memberships.get(&peer_id).copied().ok_or(Error::NotJoined(peer_id))
  }

  pub fn leave(&mut self, peer_id: PeerId) -> Result<Left> {
    let room_id = self.memberships.remove(&peer_id).ok_or(Error::NotJoined(peer_id))?;

    let Some(room) = self.rooms.get_mut(&room_id) else {
      return Ok(Left { room_id, remaining: Vec::new() });
    };
    room.members.retain(|member| *member != peer_id);

    if room.is_empty() {
      debug!("destroy room room_id={room_id} name={}", room.name);
      let name = room.name.clone();
      self.rooms.remove(&room_id);
      self.names.remove(&name);
      return Ok(Left { room_id, remaining: Vec::new() });
    }

    Ok(Left { room_id, remaining: room.members.clone() })
  }

  pub fn room(&self, room_id: RoomId) -> Option<&Room> {
    self.rooms.get(&room_id)
  }

  #[cfg(test)]
  fn room_by_name(&self, room_name: &RoomName) -> Option<&Room> {
    self.names.get(room_name).and_then(|room_id| self.rooms.get(room_id))
  }

  pub fn rooms(&self) -> impl Iterator<Item = &Room> {
    self.rooms.values()
  }

  pub fn membership_count(&self) -> usize {
    self.memberships.len()
  }
}
