use std::sync::atomic::{AtomicBool, Ordering};

/// Holds an in-progress flag for as long as it lives.
///
/// Dropping the guard clears the flag, so an early return or an error inside
/// the guarded section cannot leave it stuck.
pub(crate) struct ReentrancyGuard<'a> {
  flag: &'a AtomicBool,
}

impl<'a> ReentrancyGuard<'a> {
  /// Set the flag, or return `None` if someone else already holds it.
  pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self { flag })
  }
}

impl Drop for ReentrancyGuard<'_> {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
  }
}
