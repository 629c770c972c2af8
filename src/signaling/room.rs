use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use ulid::Ulid;

use super::peer::PeerId;

/// Unique room identity. Never derived from the room name, so a name reused after the room
/// was destroyed yields a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RoomId(Ulid);

impl RoomId {
  pub(super) fn new() -> Self {
    Self(Ulid::new())
  }
}

impl fmt::Display for RoomId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.to_string().to_lowercase())
  }
}

impl Serialize for RoomId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// Human chosen room label. Case-sensitive.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for RoomName {
  fn from(name: &str) -> Self {
    Self(name.to_owned())
  }
}

impl From<String> for RoomName {
  fn from(name: String) -> Self {
    Self(name)
  }
}

impl fmt::Display for RoomName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct Room {
  pub id: RoomId,
  pub name: RoomName,
  pub members: Vec<PeerId>,
}

impl Room {
  pub(super) fn new(id: RoomId, name: RoomName) -> Self {
    Self { id, name, members: Default::default() }
  }

  pub fn contains(&self, peer_id: PeerId) -> bool {
    self.members.contains(&peer_id)
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }
}
