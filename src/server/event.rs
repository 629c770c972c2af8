use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events sent by a connection to the relay.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub(super) enum Event {
  #[serde(rename_all = "camelCase")]
  JoinRoom {
    room_name: String,
    user_name: String,
  },
  LeaveRoom,
  Offer {
    target: String,
    offer: Value,
    caller: String,
  },
  Answer {
    target: String,
    answer: Value,
  },
  IceCandidate {
    target: String,
    candidate: Value,
  },
  Ping,
}

impl Event {
  pub fn name(&self) -> &'static str {
    match self {
      Event::JoinRoom { .. } => "join-room",
      Event::LeaveRoom => "leave-room",
      Event::Offer { .. } => "offer",
      Event::Answer { .. } => "answer",
      Event::IceCandidate { .. } => "ice-candidate",
      Event::Ping => "ping",
    }
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serde_json::to_string(self).map_err(|_| fmt::Error)?)
  }
}

impl FromStr for Event {
  type Err = serde_json::Error;

  fn from_str(s: &str) -> serde_json::Result<Self> {
    serde_json::from_str(s)
  }
}
