//! Cache record type.

use serde::Serialize;
use serde_json::Value;

/// A cached value as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
  /// Opaque lookup key (e.g. "orders:page=1")
  pub key: String,
  /// The cached payload
  pub data: Value,
  /// When the entry was written (epoch ms)
  pub timestamp: i64,
  /// Absolute expiry (epoch ms). `None` never expires.
  pub expires_at: Option<i64>,
}

impl CacheEntry {
  /// Whether the entry is logically absent at `now_ms`.
  pub fn is_expired(&self, now_ms: i64) -> bool {
    self.expires_at.is_some_and(|expires_at| expires_at < now_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(expires_at: Option<i64>) -> CacheEntry {
    CacheEntry {
      key: "k".to_string(),
      data: Value::Null,
      timestamp: 0,
      expires_at,
    }
  }

  #[test]
  fn test_no_expiry_never_expires() {
    assert!(!entry(None).is_expired(i64::MAX));
  }

  #[test]
  fn test_expires_strictly_after_deadline() {
    let e = entry(Some(100));
    assert!(!e.is_expired(99));
    assert!(!e.is_expired(100));
    assert!(e.is_expired(101));
  }
}
