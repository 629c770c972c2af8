use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::peer::PeerId;

/// Events pushed from the relay to a connection.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub(crate) enum Event {
  RoomUsers(Vec<PeerId>),
  #[serde(rename_all = "camelCase")]
  UserJoined {
    user_id: PeerId,
    user_name: String,
  },
  Offer {
    offer: Value,
    caller: String,
  },
  Answer {
    answer: Value,
    answerer: PeerId,
  },
  IceCandidate {
    candidate: Value,
    sender: PeerId,
  },
  UserDisconnected(PeerId),
  Error {
    kind: &'static str,
    message: String,
  },
  Pong,
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
  }
}
