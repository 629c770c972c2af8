use std::time::Duration;

/// Default interval between two transport-level pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct Config {
  /// Interval between pings. A peer that missed the previous pong is disconnected.
  pub heartbeat_interval: Duration,
  /// Origins allowed by CORS. Any origin is allowed when empty.
  pub allowed_origins: Vec<String>,
}

impl Default for Config {
  fn default() -> Self {
    Self { heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL, allowed_origins: Vec::new() }
  }
}

impl Config {
  pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
    self.heartbeat_interval = interval.max(Duration::from_millis(100));
    self
  }

  pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
    self.allowed_origins.push(origin.into());
    self
  }
}
