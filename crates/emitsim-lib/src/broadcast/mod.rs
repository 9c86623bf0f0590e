//! Time-compressed replay of scheduled messages.
//!
//! - [`Enqueuer`] - Producers schedule payloads at absolute epoch times
//! - [`QueueBackend`] - Sorted set plus control channel, in memory or SQLite
//! - [`Broadcaster`] - Emits each entry when the queue's virtual clock
//!   reaches it, trimming entries that fall behind

mod broadcaster;
mod clock;
mod queue;
mod retry;
mod sink;

pub use broadcaster::{BroadcastStats, Broadcaster, BroadcasterHandle, BroadcasterState};
pub use clock::QueueClock;
pub use queue::{
    epoch_seconds, validate_queue_name, ControlBus, ControlNotice, Enqueuer, MemoryQueueBackend,
    QueueBackend, QueueDefinition, QueueEntry, SqliteQueueBackend, QUIT_QUEUE,
};
pub use retry::{calculate_backoff, with_backoff};
pub use sink::{ChannelSink, MessageSink, WriterSink};
