use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Error;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tracing::{debug, error, info, instrument, warn};

use crate::server::event::Event;
use crate::server::state::ServerState;
use crate::signaling::{self, PeerId};
use crate::Signaling;

pub(crate) async fn signal(
  ws: WebSocketUpgrade,
  State(state): State<ServerState>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

#[instrument(name = "socket", skip_all, fields(addr = addr.to_string()))]
async fn handle_socket(socket: WebSocket, state: ServerState, addr: SocketAddr) {
  let (ws_sender, ws_receiver) = socket.split();
  let (sender, receiver) = mpsc::unbounded_channel();
  let peer_id = state.signaling.add_peer(sender.clone());
  info!("{peer_id} connected");

  let interval = state.config.heartbeat_interval;
  tokio::select! {
    _ = handle_channel(receiver, ws_sender) => {},
    _ = handle_heartbeats(peer_id, sender, interval, state.signaling.clone()) => {},
    _ = handle_messages(peer_id, ws_receiver, state.signaling.clone()) => {},
  }

  if let Err(e) = state.signaling.remove_peer(peer_id) {
    error!("{e}");
  }
  info!("{peer_id} disconnected");
}

async fn handle_channel(
  receiver: UnboundedReceiver<Result<Message, Error>>,
  ws_sender: SplitSink<WebSocket, Message>,
) -> Result<()> {
  UnboundedReceiverStream::new(receiver).forward(ws_sender).await.map_err(Into::into)
}

#[instrument(name = "heartbeat", skip_all, fields(peer = peer_id.to_string()))]
async fn handle_heartbeats(
  peer_id: PeerId,
  sender: UnboundedSender<Result<Message, Error>>,
  interval: Duration,
  signaling: Signaling,
) -> Result<()> {
  let mut stream = IntervalStream::new(tokio::time::interval(interval));
  while stream.next().await.is_some() {
    if signaling.is_alive(peer_id) {
      debug!("send ping");
      signaling.set_peer_alive(peer_id, false)?;
      sender.send(Ok(Message::Ping(Vec::new())))?;
    } else {
      info!("connection timeout");
      break;
    }
  }
  Ok(())
}

#[instrument(name = "message", skip_all, fields(peer = peer_id.to_string()))]
async fn handle_messages(
  peer_id: PeerId,
  mut ws_receiver: SplitStream<WebSocket>,
  signaling: Signaling,
) {
  while let Some(Ok(message)) = ws_receiver.next().await {
    if let Message::Close(_) = message {
      info!("closed by peer");
      break;
    }

    if let Err(e) = handle_message(message, peer_id, &signaling) {
      warn!("{e}");
      if !matches!(e, signaling::Error::PeerNotFound(_)) {
        if let Err(e) = signaling.report(peer_id, &e) {
          error!("{e}")
        }
      }
    }
  }
}

fn handle_message(
  message: Message,
  peer_id: PeerId,
  signaling: &Signaling,
) -> signaling::Result<()> {
  match message {
    Message::Text(payload) => handle_event(&payload, peer_id, signaling),
    Message::Binary(_) => Err(signaling::Error::BadRequest("unsupported binary message".into())),
    Message::Pong(_) => {
      debug!("recv pong");
      signaling.set_peer_alive(peer_id, true)
    }
    Message::Ping(_) | Message::Close(_) => Ok(()),
  }
}

fn handle_event(payload: &str, peer_id: PeerId, signaling: &Signaling) -> signaling::Result<()> {
  let event: Event =
    payload.parse().map_err(|e| signaling::Error::BadRequest(format!("invalid event: {e}")))?;
  info!("recv event event={}", event.name());
  debug!("payload={event}");

  match event {
    Event::JoinRoom { room_name, user_name } => {
      signaling.join_room(peer_id, &room_name, &user_name)?;
    }
    Event::LeaveRoom => signaling.leave_room(peer_id)?,
    Event::Offer { target, offer, caller } => signaling.relay_offer(&target, offer, caller),
    Event::Answer { target, answer } => signaling.relay_answer(peer_id, &target, answer),
    Event::IceCandidate { target, candidate } => {
      signaling.relay_ice_candidate(peer_id, &target, candidate)
    }
    Event::Ping => signaling.pong(peer_id)?,
  }

  Ok(())
}
