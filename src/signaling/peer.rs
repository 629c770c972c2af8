use std::fmt;
use std::str::FromStr;

use axum::extract::ws::Message;
use axum::Error;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc::UnboundedSender;
use ulid::Ulid;

pub type PeerSender = UnboundedSender<Result<Message, Error>>;

/// Connection identity, handed out once per established socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(Ulid);

impl PeerId {
  pub(super) fn new() -> Self {
    Self(Ulid::new())
  }
}

impl fmt::Display for PeerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.to_string().to_lowercase())
  }
}

impl FromStr for PeerId {
  type Err = ulid::DecodeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ulid::from_string(&s.to_uppercase()).map(Self)
  }
}

impl Serialize for PeerId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

#[derive(Debug, Serialize)]
pub struct Peer {
  pub id: PeerId,
  pub is_alive: bool,
  #[serde(skip)]
  pub sender: PeerSender,
}

impl Peer {
  pub(super) fn new(id: PeerId, sender: PeerSender) -> Self {
    Self { id, is_alive: true, sender }
  }
}
