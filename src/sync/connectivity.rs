//! Online/offline signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Reports whether the network is believed reachable.
pub trait Connectivity: Send + Sync {
  fn is_online(&self) -> bool;
}

/// Shared flag flipped by whatever watches the network.
#[derive(Debug, Clone)]
pub struct OnlineFlag(Arc<AtomicBool>);

impl OnlineFlag {
  pub fn new(online: bool) -> Self {
    Self(Arc::new(AtomicBool::new(online)))
  }

  pub fn set_online(&self, online: bool) {
    self.0.store(online, Ordering::Release);
  }
}

impl Default for OnlineFlag {
  fn default() -> Self {
    Self::new(true)
  }
}

impl Connectivity for OnlineFlag {
  fn is_online(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

impl Connectivity for watch::Receiver<bool> {
  fn is_online(&self) -> bool {
    *self.borrow()
  }
}
