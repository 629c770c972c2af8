mod config;
mod server;
pub mod signaling;

pub use self::config::{Config, DEFAULT_HEARTBEAT_INTERVAL};
pub use self::server::Server;
pub use self::signaling::Signaling;
