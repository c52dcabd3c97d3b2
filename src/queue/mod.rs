//! Durable FIFO queue of mutating requests awaiting replay.

mod action;
mod action_queue;
mod storage;

pub use action::{ActionType, HttpMethod, NewAction, ParseVariantError, QueuedAction};
pub use action_queue::{ActionQueue, ProcessResult, MAX_RETRIES};
