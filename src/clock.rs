//! Time source injected into the cache and queue.

use chrono::Utc;

/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> i64;
}

/// Real time via chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_ms(&self) -> i64 {
    Utc::now().timestamp_millis()
  }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
  use super::Clock;
  use std::sync::atomic::{AtomicI64, Ordering};

  /// Clock that only moves when told to.
  #[derive(Debug)]
  pub struct ManualClock(AtomicI64);

  impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
      Self(AtomicI64::new(start_ms))
    }

    pub fn advance(&self, ms: i64) {
      self.0.fetch_add(ms, Ordering::SeqCst);
    }
  }

  impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
      self.0.load(Ordering::SeqCst)
    }
  }
}
