//! Offline persistence and sync engine for REST clients.
//!
//! - [`OfflineCache`]: durable cache of API responses with per-key expiry
//! - [`ActionQueue`]: durable FIFO of writes that could not be sent yet
//! - [`SyncService`]: replays the queue when connectivity returns
//!
//! All three share one SQLite [`Database`] and take their collaborators
//! (store, clock, executor, connectivity) as constructor arguments.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
mod guard;
pub mod logging;
pub mod queue;
pub mod sync;
pub mod transport;

pub use cache::{CacheEntry, OfflineCache};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use db::{Database, StoreError, StoreLocation};
pub use queue::{
  ActionQueue, ActionType, HttpMethod, NewAction, ProcessResult, QueuedAction, MAX_RETRIES,
};
pub use sync::{Connectivity, OnlineFlag, QueueStatus, Subscription, SyncResult, SyncService};
pub use transport::{ApiExecutor, HttpExecutor, ReplayResponse, RequestOptions, TokenSource};
