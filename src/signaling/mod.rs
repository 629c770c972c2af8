mod error;
mod event;
mod peer;
mod registry;
mod room;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use self::error::{Error, Result};
pub(crate) use self::event::Event;
pub use self::peer::{Peer, PeerId, PeerSender};
pub use self::registry::{Joined, Left, Registry};
pub use self::room::{Room, RoomId, RoomName};

/// Relay dispatcher: owns the room registry and the outbound queue of every connected peer.
///
/// Registry operations run under a single mutex. Notifications they produce are pushed onto the
/// recipients' unbounded queues before the lock is released, so every member of a room observes
/// joins and leaves in the order they were applied. Pushing never blocks; the socket writes
/// happen on each connection's own task.
#[derive(Clone, Debug, Default)]
pub struct Signaling {
  peers: Arc<RwLock<HashMap<PeerId, Peer>>>,
  registry: Arc<Mutex<Registry>>,
}

impl Signaling {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn peers(&self) -> Vec<PeerId> {
    self.peers.read_arc().keys().copied().collect()
  }

  pub fn rooms(&self) -> Vec<Room> {
    self.registry.lock().rooms().cloned().collect()
  }

  pub fn room_of(&self, peer_id: PeerId) -> Result<RoomId> {
    self.registry.lock().relay_target(peer_id)
  }

  pub fn add_peer(&self, sender: PeerSender) -> PeerId {
    let peer_id = PeerId::new();
    debug!("add peer");

    self.peers.write().insert(peer_id, Peer::new(peer_id, sender));
    peer_id
  }

  /// Releases everything the peer holds. Safe to call for a peer that never joined a room.
  pub fn remove_peer(&self, peer_id: PeerId) -> Result<()> {
    debug!("remove peer");

    match self.leave_room(peer_id) {
      Ok(()) | Err(Error::NotJoined(_)) => {}
      Err(e) => return Err(e),
    }

    self.peers.write().remove(&peer_id).map(|_| ()).ok_or(Error::PeerNotFound(peer_id))
  }

  pub fn set_peer_alive(&self, peer_id: PeerId, is_alive: bool) -> Result<()> {
    debug!("set peer alive is_alive={is_alive}");

    self.peers.write().get_mut(&peer_id).ok_or(Error::PeerNotFound(peer_id))?.is_alive = is_alive;
    Ok(())
  }

  pub fn is_alive(&self, peer_id: PeerId) -> bool {
    self.peers.read().get(&peer_id).map(|peer| peer.is_alive).unwrap_or(false)
  }

  /// Joins the room named `room_name`, creating it if needed. The joiner receives the list of
  /// members already there, and each of them is told about the joiner.
  pub fn join_room(&self, peer_id: PeerId, room_name: &str, user_name: &str) -> Result<RoomId> {
    if room_name.is_empty() {
      return Err(Error::BadRequest("roomName must not be empty".into()));
    }
    if user_name.is_empty() {
      return Err(Error::BadRequest("userName must not be empty".into()));
    }

    if !self.peers.read().contains_key(&peer_id) {
      return Err(Error::PeerNotFound(peer_id));
    }

    let mut registry = self.registry.lock();
    let Joined { room_id, existing } = registry.join(peer_id, room_name.into())?;
    info!("{user_name} ({peer_id}) joined room {room_name} room_id={room_id}");

    let joined = Event::UserJoined { user_id: peer_id, user_name: user_name.to_owned() };
    self.broadcast(&existing, &joined);
    if let Err(e) = self.send(peer_id, &Event::RoomUsers(existing)) {
      warn!("{e}")
    }

    Ok(room_id)
  }

  /// Leaves the current room and tells the remaining members. The room is destroyed when the
  /// last member leaves.
  pub fn leave_room(&self, peer_id: PeerId) -> Result<()> {
    let mut registry = self.registry.lock();
    let Left { room_id, remaining } = registry.leave(peer_id)?;

    if remaining.is_empty() {
      info!("{peer_id} left room_id={room_id}, room closed");
    } else {
      info!("{peer_id} left room_id={room_id}");
      self.broadcast(&remaining, &Event::UserDisconnected(peer_id));
    }

    Ok(())
  }

  pub fn relay_offer(&self, target: &str, offer: Value, caller: String) {
    self.relay(target, &Event::Offer { offer, caller });
  }

  pub fn relay_answer(&self, peer_id: PeerId, target: &str, answer: Value) {
    self.relay(target, &Event::Answer { answer, answerer: peer_id });
  }

  pub fn relay_ice_candidate(&self, peer_id: PeerId, target: &str, candidate: Value) {
    self.relay(target, &Event::IceCandidate { candidate, sender: peer_id });
  }

  pub fn pong(&self, peer_id: PeerId) -> Result<()> {
    self.send(peer_id, &Event::Pong)
  }

  /// Tells a peer why its last event was rejected.
  pub fn report(&self, peer_id: PeerId, error: &Error) -> Result<()> {
    self.send(peer_id, &Event::Error { kind: error.kind(), message: error.to_string() })
  }

  /// Forwards an event to `target`. Unknown or departed targets are ignored: they may have
  /// disconnected while the event was in flight.
  fn relay(&self, target: &str, event: &Event) {
    let Ok(target) = target.parse::<PeerId>() else {
      debug!("drop relay to malformed target={target}");
      return;
    };

    match self.send(target, event) {
      Ok(()) => debug!("relay to target={target}"),
      Err(e) => debug!("drop relay: {e}"),
    }
  }

  fn broadcast(&self, peer_ids: &[PeerId], event: &Event) {
    debug!("broadcast event={event}");

    peer_ids.iter().for_each(|peer_id| {
      if let Err(e) = self.send(*peer_id, event) {
        warn!("{e}")
      }
    });
  }

  fn send(&self, peer_id: PeerId, event: &Event) -> Result<()> {
    let peers = self.peers.read();
    let peer = peers.get(&peer_id).ok_or(Error::PeerNotFound(peer_id))?;

    if peer.sender.send(Ok(Message::Text(event.to_string()))).is_err() {
      debug!("peer {peer_id} outbound queue closed");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use axum::extract::ws::Message;
  use serde_json::{json, Value};
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  use super::*;

  type Inbox = UnboundedReceiver<std::result::Result<Message, axum::Error>>;

  fn connect(signaling: &Signaling) -> (PeerId, Inbox) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (signaling.add_peer(sender), receiver)
  }

  fn recv(inbox: &mut Inbox) -> Value {
    match inbox.try_recv() {
      Ok(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
      other => panic!("expected a text message, got {other:?}"),
    }
  }

  fn assert_empty(inbox: &mut Inbox) {
    assert!(inbox.try_recv().is_err(), "unexpected message");
  }

  #[test]
  fn lobby_scenario() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);
    let (bob, mut bob_inbox) = connect(&signaling);

    let room_id = signaling.join_room(alice, "lobby", "Alice").unwrap();
    assert_eq!(recv(&mut alice_inbox), json!({ "event": "room-users", "data": [] }));

    assert_eq!(signaling.join_room(bob, "lobby", "Bob").unwrap(), room_id);
    assert_eq!(
      recv(&mut alice_inbox),
      json!({ "event": "user-joined", "data": { "userId": bob.to_string(), "userName": "Bob" } })
    );
    assert_eq!(
      recv(&mut bob_inbox),
      json!({ "event": "room-users", "data": [alice.to_string()] })
    );

    let offer = json!({ "type": "offer", "sdp": "v=0" });
    signaling.relay_offer(&bob.to_string(), offer.clone(), alice.to_string());
    assert_eq!(
      recv(&mut bob_inbox),
      json!({ "event": "offer", "data": { "offer": offer, "caller": alice.to_string() } })
    );
    assert_empty(&mut alice_inbox);

    signaling.remove_peer(bob).unwrap();
    assert_eq!(
      recv(&mut alice_inbox),
      json!({ "event": "user-disconnected", "data": bob.to_string() })
    );
    let rooms = signaling.rooms();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].members, vec![alice]);

    signaling.remove_peer(alice).unwrap();
    assert!(signaling.rooms().is_empty());
    assert!(signaling.peers().is_empty());
    assert_eq!(signaling.registry.lock().membership_count(), 0);
  }

  #[test]
  fn answer_and_candidate_name_the_sender() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);
    let (bob, _bob_inbox) = connect(&signaling);

    signaling.relay_answer(bob, &alice.to_string(), json!({ "sdp": "v=0" }));
    signaling.relay_ice_candidate(bob, &alice.to_string(), json!("candidate:1"));

    assert_eq!(
      recv(&mut alice_inbox),
      json!({ "event": "answer", "data": { "answer": { "sdp": "v=0" }, "answerer": bob.to_string() } })
    );
    assert_eq!(
      recv(&mut alice_inbox),
      json!({ "event": "ice-candidate", "data": { "candidate": "candidate:1", "sender": bob.to_string() } })
    );
  }

  #[test]
  fn relay_to_unknown_target_is_silent() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);
    let (gone, _) = connect(&signaling);
    signaling.join_room(alice, "lobby", "Alice").unwrap();
    recv(&mut alice_inbox);
    signaling.remove_peer(gone).unwrap();

    signaling.relay_offer(&gone.to_string(), json!({}), alice.to_string());
    signaling.relay_answer(alice, "nobody", json!({}));
    signaling.relay_ice_candidate(alice, "", json!(null));

    assert_empty(&mut alice_inbox);
    assert!(signaling.room_of(alice).is_ok());
  }

  #[test]
  fn relay_does_not_require_a_shared_room() {
    let signaling = Signaling::new();
    let (alice, _alice_inbox) = connect(&signaling);
    let (bob, mut bob_inbox) = connect(&signaling);
    signaling.join_room(alice, "red", "Alice").unwrap();
    signaling.join_room(bob, "blue", "Bob").unwrap();
    recv(&mut bob_inbox);

    signaling.relay_ice_candidate(alice, &bob.to_string(), json!("candidate:2"));

    assert_eq!(recv(&mut bob_inbox)["event"], "ice-candidate");
  }

  #[test]
  fn join_rejects_empty_fields_without_mutation() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);

    assert!(matches!(signaling.join_room(alice, "", "Alice"), Err(Error::BadRequest(_))));
    assert!(matches!(signaling.join_room(alice, "lobby", ""), Err(Error::BadRequest(_))));

    assert!(signaling.rooms().is_empty());
    assert_eq!(signaling.room_of(alice), Err(Error::NotJoined(alice)));
    assert_empty(&mut alice_inbox);
  }

  #[test]
  fn second_join_is_rejected_and_reported() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);
    let room_id = signaling.join_room(alice, "lobby", "Alice").unwrap();
    recv(&mut alice_inbox);

    let err = signaling.join_room(alice, "kitchen", "Alice").unwrap_err();
    assert_eq!(err, Error::AlreadyJoined { peer: alice, room: room_id });
    signaling.report(alice, &err).unwrap();

    let json = recv(&mut alice_inbox);
    assert_eq!(json["event"], "error");
    assert_eq!(json["data"]["kind"], "already-joined");
    assert_eq!(signaling.rooms().len(), 1);
  }

  #[test]
  fn explicit_leave_allows_rejoin() {
    let signaling = Signaling::new();
    let (alice, mut alice_inbox) = connect(&signaling);
    let (bob, mut bob_inbox) = connect(&signaling);
    signaling.join_room(alice, "lobby", "Alice").unwrap();
    signaling.join_room(bob, "lobby", "Bob").unwrap();
    recv(&mut alice_inbox);
    recv(&mut alice_inbox);
    recv(&mut bob_inbox);

    signaling.leave_room(bob).unwrap();
    assert_eq!(recv(&mut alice_inbox)["event"], "user-disconnected");
    assert_eq!(signaling.leave_room(bob), Err(Error::NotJoined(bob)));

    signaling.join_room(bob, "kitchen", "Bob").unwrap();
    assert_eq!(recv(&mut bob_inbox), json!({ "event": "room-users", "data": [] }));
    assert_eq!(signaling.rooms().len(), 2);
  }

  #[test]
  fn last_member_leaving_destroys_room() {
    let signaling = Signaling::new();
    let (alice, _alice_inbox) = connect(&signaling);
    let (bob, _bob_inbox) = connect(&signaling);

    let first = signaling.join_room(alice, "x", "Alice").unwrap();
    signaling.remove_peer(alice).unwrap();
    let second = signaling.join_room(bob, "x", "Bob").unwrap();

    assert_ne!(first, second);
  }

  #[test]
  fn remove_peer_is_idempotent_for_membership() {
    let signaling = Signaling::new();
    let (alice, _alice_inbox) = connect(&signaling);

    signaling.remove_peer(alice).unwrap();

    assert_eq!(signaling.remove_peer(alice), Err(Error::PeerNotFound(alice)));
    assert!(signaling.rooms().is_empty());
  }

  #[test]
  fn heartbeat_flag() {
    let signaling = Signaling::new();
    let (alice, _alice_inbox) = connect(&signaling);

    assert!(signaling.is_alive(alice));
    signaling.set_peer_alive(alice, false).unwrap();
    assert!(!signaling.is_alive(alice));
    signaling.remove_peer(alice).unwrap();
    assert!(!signaling.is_alive(alice));
    assert_eq!(signaling.set_peer_alive(alice, true), Err(Error::PeerNotFound(alice)));
  }

  #[tokio::test]
  async fn concurrent_joins_share_one_room() {
    let signaling = Signaling::new();
    let peers: Vec<(PeerId, Inbox)> = (0..32).map(|_| connect(&signaling)).collect();

    let handles: Vec<_> = peers
      .iter()
      .map(|(peer_id, _)| {
        let signaling = signaling.clone();
        let peer_id = *peer_id;
        tokio::spawn(async move { signaling.join_room(peer_id, "party", "guest") })
      })
      .collect();

    let mut room_ids = Vec::new();
    for handle in handles {
      room_ids.push(handle.await.unwrap().unwrap());
    }

    assert!(room_ids.windows(2).all(|pair| pair[0] == pair[1]));
    let rooms = signaling.rooms();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].members.len(), peers.len());
  }

  #[test]
  fn join_succeeds_when_outbound_queue_is_closed() {
    let signaling = Signaling::new();
    let (alice, alice_inbox) = connect(&signaling);
    drop(alice_inbox);

    let room_id = signaling.join_room(alice, "lobby", "Alice").unwrap();

    assert_eq!(signaling.room_of(alice), Ok(room_id));
  }

  fn membership_events(inbox: &mut Inbox) -> Vec<String> {
    let mut events = Vec::new();
    while let Ok(Ok(Message::Text(text))) = inbox.try_recv() {
      let json: Value = serde_json::from_str(&text).unwrap();
      match json["event"].as_str() {
        Some("user-joined") => events.push(format!("joined:{}", json["data"]["userId"])),
        Some("user-disconnected") => events.push(format!("left:{}", json["data"])),
        _ => {}
      }
    }
    events
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
  async fn members_observe_membership_changes_in_the_same_order() {
    let signaling = Signaling::new();
    let mut peers: Vec<(PeerId, Inbox)> = (0..64).map(|_| connect(&signaling)).collect();

    let handles: Vec<_> = peers
      .iter()
      .enumerate()
      .map(|(i, (peer_id, _))| {
        let signaling = signaling.clone();
        let peer_id = *peer_id;
        tokio::spawn(async move {
          signaling.join_room(peer_id, "r", "guest").unwrap();
          if i % 2 == 1 {
            signaling.remove_peer(peer_id).unwrap();
          }
        })
      })
      .collect();
    for handle in handles {
      handle.await.unwrap();
    }

    let timelines: Vec<Vec<String>> =
      peers.iter_mut().map(|(_, inbox)| membership_events(inbox)).collect();

    for (i, a) in timelines.iter().enumerate() {
      for b in &timelines[i + 1..] {
        let shared_a: Vec<&String> = a.iter().filter(|event| b.contains(event)).collect();
        let shared_b: Vec<&String> = b.iter().filter(|event| a.contains(event)).collect();
        assert_eq!(shared_a, shared_b);
      }
    }
    assert_eq!(signaling.rooms()[0].members.len(), 32);
  }
}
