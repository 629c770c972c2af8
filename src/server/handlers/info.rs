use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::server::state::ServerState;
use crate::signaling::{PeerId, Room};

#[derive(Serialize)]
struct Info {
  peers: Vec<PeerId>,
  rooms: Vec<Room>,
}

pub(crate) async fn info(State(state): State<ServerState>) -> impl IntoResponse {
  Json(Info { peers: state.signaling.peers(), rooms: state.signaling.rooms() })
}
