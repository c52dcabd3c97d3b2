//! Sync orchestration over the action queue.

use color_eyre::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connectivity::Connectivity;
use crate::cache::OfflineCache;
use crate::guard::ReentrancyGuard;
use crate::queue::{ActionQueue, MAX_RETRIES};
use crate::transport::HttpExecutor;

/// Outcome of a [`SyncService::sync`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
  pub processed: usize,
  pub failed: usize,
  /// Cached responses exist that may now be out of date. Nothing was
  /// refetched; callers decide what to reload.
  pub cached_data_refreshed: bool,
}

/// Queue summary for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
  /// Actions that will be sent on the next pass
  pub pending: usize,
  /// Actions that exhausted their retries and will be dropped
  pub failed: usize,
  pub total: usize,
}

/// Called once after every completed sync.
pub type SyncListener = Arc<dyn Fn(&SyncResult) + Send + Sync>;

type Listeners = Mutex<Vec<SyncListener>>;

/// Decides when to drain the queue and tells listeners when it did.
pub struct SyncService<E> {
  queue: Arc<ActionQueue>,
  cache: Arc<OfflineCache>,
  executor: E,
  connectivity: Arc<dyn Connectivity>,
  syncing: AtomicBool,
  listeners: Arc<Listeners>,
}

impl<E: HttpExecutor> SyncService<E> {
  pub fn new(
    queue: Arc<ActionQueue>,
    cache: Arc<OfflineCache>,
    executor: E,
    connectivity: Arc<dyn Connectivity>,
  ) -> Self {
    Self {
      queue,
      cache,
      executor,
      connectivity,
      syncing: AtomicBool::new(false),
      listeners: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Replay the queue if online and no other sync is running.
  ///
  /// Returns an all-zero result when skipped. Listeners are notified after
  /// every pass that ran, whether or not anything was sent.
  pub async fn sync(&self) -> Result<SyncResult> {
    let Some(_guard) = ReentrancyGuard::acquire(&self.syncing) else {
      debug!("sync already in progress");
      return Ok(SyncResult::default());
    };

    if !self.connectivity.is_online() {
      info!("offline, skipping sync");
      return Ok(SyncResult::default());
    }

    let drained = self.queue.process_queue(&self.executor).await?;
    let cached_data_refreshed = !self.cache.get_all_keys().await.is_empty();

    let result = SyncResult {
      processed: drained.processed,
      failed: drained.failed,
      cached_data_refreshed,
    };
    self.notify(&result);

    info!(
      processed = result.processed,
      failed = result.failed,
      cached_data_refreshed,
      "sync complete"
    );
    Ok(result)
  }

  /// Register a listener. Registering the same `Arc` twice has no effect.
  pub fn on_sync(&self, listener: SyncListener) -> Subscription {
    {
      let mut listeners = lock(&self.listeners);
      if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
        listeners.push(Arc::clone(&listener));
      }
    }

    Subscription {
      listeners: Arc::downgrade(&self.listeners),
      listener,
    }
  }

  pub fn is_syncing(&self) -> bool {
    self.syncing.load(Ordering::Acquire)
  }

  /// Count pending and exhausted actions without changing the queue.
  pub async fn get_queue_status(&self) -> Result<QueueStatus> {
    let actions = self.queue.get_all().await?;
    let failed = actions
      .iter()
      .filter(|a| a.retries >= MAX_RETRIES)
      .count();

    Ok(QueueStatus {
      pending: actions.len() - failed,
      failed,
      total: actions.len(),
    })
  }

  fn notify(&self, result: &SyncResult) {
    // Snapshot first so a listener can unsubscribe from inside its callback.
    let listeners: Vec<SyncListener> = lock(&self.listeners).clone();
    for listener in listeners {
      listener(result);
    }
  }
}

impl<E: HttpExecutor + 'static> SyncService<E> {
  /// Sync on every offline-to-online transition of `online`.
  ///
  /// Runs until the sending side of the channel is dropped. Sync errors are
  /// logged and the loop keeps going.
  pub fn watch_connectivity(self: &Arc<Self>, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
    let service = Arc::clone(self);
    tokio::spawn(async move {
      let mut was_online = *online.borrow_and_update();
      while online.changed().await.is_ok() {
        let is_online = *online.borrow_and_update();
        if is_online && !was_online {
          info!("connection restored, syncing");
          if let Err(e) = service.sync().await {
            warn!(error = %e, "sync after reconnect failed");
          }
        } else if !is_online && was_online {
          info!("connection lost");
        }
        was_online = is_online;
      }
      debug!("connectivity channel closed");
    })
  }
}

/// Handle returned by [`SyncService::on_sync`].
pub struct Subscription {
  listeners: Weak<Listeners>,
  listener: SyncListener,
}

impl Subscription {
  /// Stop receiving notifications.
  pub fn unsubscribe(self) {
    if let Some(listeners) = self.listeners.upgrade() {
      lock(&listeners).retain(|l| !Arc::ptr_eq(l, &self.listener));
    }
  }
}

fn lock(listeners: &Listeners) -> std::sync::MutexGuard<'_, Vec<SyncListener>> {
  // Listener bookkeeping cannot be left half-updated, so a poisoned lock is
  // still usable.
  listeners.lock().unwrap_or_else(|e| e.into_inner())
}
