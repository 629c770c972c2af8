mod event;
mod handlers;
mod state;

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, Level};

use crate::config::Config;
use crate::signaling::Signaling;

use self::state::ServerState;

pub struct Server {
  port: u16,
  config: Config,
  signaling: Signaling,
}

impl Server {
  pub fn new(port: u16, config: Config, signaling: Signaling) -> Self {
    Self { port, config, signaling }
  }

  pub async fn listen(self) -> Result<()> {
    let cors = cors(&self.config)?;
    let state = ServerState::new(self.signaling, self.config);
    let app = Router::new()
      .route("/", get(handlers::signal))
      .route("/info", get(handlers::info))
      .layer(cors)
      .layer(trace())
      .with_state(state);

    info!("starting server: {}", self.port);
    let addr = SocketAddr::new([0, 0, 0, 0].into(), self.port);
    axum::Server::bind(&addr)
      .serve(app.into_make_service_with_connect_info::<SocketAddr>())
      .await?;

    Ok(())
  }
}

fn cors(config: &Config) -> Result<CorsLayer> {
  let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]);
  if config.allowed_origins.is_empty() {
    return Ok(layer.allow_origin(Any));
  }

  let origins = config
    .allowed_origins
    .iter()
    .map(|origin| origin.parse::<HeaderValue>())
    .collect::<Result<Vec<_>, _>>()?;
  Ok(layer.allow_origin(origins))
}

fn trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
  TraceLayer::new_for_http()
    .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Micros))
}
