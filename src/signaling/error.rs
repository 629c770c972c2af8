use thiserror::Error;

use super::peer::PeerId;
use super::room::RoomId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("peer {peer} already joined room {room}")]
  AlreadyJoined { peer: PeerId, room: RoomId },
  #[error("peer {0} is not in a room")]
  NotJoined(PeerId),
  #[error("peer {0} does not exist")]
  PeerNotFound(PeerId),
}

impl Error {
  /// Short machine-readable tag sent back to clients.
  pub fn kind(&self) -> &'static str {
    match self {
      Error::BadRequest(_) => "bad-request",
      Error::AlreadyJoined { .. } => "already-joined",
      Error::NotJoined(_) => "not-joined",
      Error::PeerNotFound(_) => "not-found",
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
