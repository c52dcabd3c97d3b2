//! Reconnect-driven replay of the action queue.

mod connectivity;
mod service;

pub use connectivity::{Connectivity, OnlineFlag};
pub use service::{QueueStatus, Subscription, SyncListener, SyncResult, SyncService};
