use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use relay::{Config, Server, Signaling};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// Server port
  #[arg(short, long, env, default_value_t = 3001, value_parser = clap::value_parser!(u16).range(1025..))]
  port: u16,

  /// Seconds between two heartbeats
  #[arg(long, env, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
  heartbeat_interval: u64,

  /// Allowed CORS origin, any origin when omitted
  #[arg(long = "allow-origin", env = "ALLOW_ORIGIN", value_delimiter = ',')]
  allowed_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  if cfg!(not(debug_assertions)) {
    tracing_subscriber::fmt().with_env_filter(env_filter(Level::INFO)?).init();
  } else {
    tracing_subscriber::fmt().with_env_filter(env_filter(Level::DEBUG)?).without_time().init();
  }

  let args = Args::parse();
  let config = args
    .allowed_origins
    .into_iter()
    .fold(Config::default(), |config, origin| config.allow_origin(origin))
    .heartbeat_interval(Duration::from_secs(args.heartbeat_interval));

  let server = Server::new(args.port, config, Signaling::new());
  server.listen().await
}

fn env_filter(level: Level) -> Result<EnvFilter> {
  Ok(
    EnvFilter::builder()
      .with_default_directive(level.into())
      .from_env_lossy()
      .add_directive("hyper=off".parse()?)
      .add_directive("tungstenite=off".parse()?),
  )
}
