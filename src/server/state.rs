use crate::config::Config;
use crate::signaling::Signaling;

#[derive(Clone)]
pub(crate) struct ServerState {
  pub signaling: Signaling,
  pub config: Config,
}

impl ServerState {
  pub fn new(signaling: Signaling, config: Config) -> Self {
    Self { signaling, config }
  }
}
