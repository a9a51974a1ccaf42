//! Durable playlist export queue for OpenMusic
//!
//! The API publishes [`ExportJob`]s and the export worker consumes them.
//! Both sides talk to the broker through the [`MessageQueue`] trait:
//!
//! - [`RedisStreamQueue`] - Redis Streams with a consumer group; durable
//!   and at-least-once. Unacknowledged entries are handed out again when the
//!   consumer reconnects.
//! - [`InMemoryQueue`] - single-process queue with the same ack semantics,
//!   for tests and local experiments.
//!
//! # Example
//!
//! ```rust,ignore
//! use openmusic_export_queue::{ExportJob, MessageQueue, EXPORT_PLAYLIST_CHANNEL};
//!
//! let job = ExportJob::new("playlist-abc", "a@b.com");
//! queue.publish(EXPORT_PLAYLIST_CHANNEL, &job.to_payload()?).await?;
//!
//! let delivery = queue.receive(EXPORT_PLAYLIST_CHANNEL).await?;
//! // ... process ...
//! queue.ack(EXPORT_PLAYLIST_CHANNEL, &delivery).await?;
//! ```

mod error;
mod job;
mod memory;
mod redis_stream;

pub use error::{QueueError, QueueResult};
pub use job::{ExportJob, EXPORT_DEAD_LETTER_CHANNEL, EXPORT_PLAYLIST_CHANNEL};
pub use memory::InMemoryQueue;
pub use redis_stream::{RedisStreamQueue, StreamConsumer};

use async_trait::async_trait;

/// A message handed to a consumer, not yet acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned message id
    pub id: String,

    /// Raw message body
    pub payload: Vec<u8>,

    /// Processing attempt, starting at 1; bumped on every requeueing nack
    pub attempt: u32,

    /// Set when the broker hands out a message that was delivered before
    /// but never acknowledged
    pub redelivered: bool,
}

/// A named, durable, at-least-once message channel
///
/// Every message returned by [`receive`](MessageQueue::receive) must be
/// settled with exactly one [`ack`](MessageQueue::ack) or
/// [`nack`](MessageQueue::nack). Messages left unsettled when the consumer
/// goes away are delivered again; a consumer that stays up but failed to
/// settle hands them back with
/// [`release_unsettled`](MessageQueue::release_unsettled).
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Declare the channel; a no-op if it already exists
    async fn ensure_channel(&self, channel: &str) -> QueueResult<()>;

    /// Append one message to the channel
    async fn publish(&self, channel: &str, payload: &[u8]) -> QueueResult<()>;

    /// Wait for the next message on the channel
    async fn receive(&self, channel: &str) -> QueueResult<Delivery>;

    /// Remove a delivered message permanently
    async fn ack(&self, channel: &str, delivery: &Delivery) -> QueueResult<()>;

    /// Reject a delivered message
    ///
    /// With `requeue` the message goes back on the channel with its attempt
    /// counter incremented; without it the message is discarded.
    async fn nack(&self, channel: &str, delivery: &Delivery, requeue: bool) -> QueueResult<()>;

    /// Hand every message this consumer holds unsettled back to the channel
    ///
    /// They come out of [`receive`](MessageQueue::receive) again, ahead of
    /// new messages and flagged as redelivered.
    async fn release_unsettled(&self, channel: &str) -> QueueResult<()>;
}
