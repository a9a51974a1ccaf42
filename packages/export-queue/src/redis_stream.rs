//! Redis Streams backend
//!
//! Each channel is a stream key with one consumer group. Producers `XADD`,
//! the consumer reads with `XREADGROUP` and settles with `XACK`. Entries
//! read but never acknowledged stay in the group's pending entries list;
//! after a (re)connect the consumer drains its own pending list (id `0`)
//! before asking for new entries (id `>`), which is what turns a crash
//! between receive and ack into a redelivery.
//!
//! Durability is whatever the Redis server is configured for; run it with
//! AOF enabled if queued exports must survive a broker restart.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult};

use crate::error::{QueueError, QueueResult};
use crate::{Delivery, MessageQueue};

const PAYLOAD_FIELD: &str = "payload";
const PRODUCER_NAME: &str = "producer";
const ATTEMPT_FIELD: &str = "attempt";

/// Identity of this process within the stream's consumer group
#[derive(Debug, Clone)]
pub struct StreamConsumer {
    /// Consumer group name, shared by producer and consumer
    pub group: String,

    /// Consumer name; must be stable across restarts so pending entries
    /// are picked up again
    pub name: String,

    /// How long a single `XREADGROUP` blocks before re-polling, in milliseconds
    pub block_ms: usize,
}

impl StreamConsumer {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            block_ms: 5_000,
        }
    }

    /// Identity for a process that only publishes
    ///
    /// A producer still needs the group name: `ensure_channel` creates the
    /// group at id `0` so entries published before any consumer starts are
    /// delivered to it. The consumer name is never used since a producer
    /// does not read.
    pub fn producer(group: impl Into<String>) -> Self {
        Self::new(group, PRODUCER_NAME)
    }

    pub fn with_block_ms(mut self, block_ms: usize) -> Self {
        self.block_ms = block_ms;
        self
    }
}

/// [`MessageQueue`] over Redis Streams
pub struct RedisStreamQueue {
    connection: ConnectionManager,
    consumer: StreamConsumer,
    /// Channels whose pending entries list has been read to the end since
    /// the last connection error
    drained: Mutex<HashSet<String>>,
}

impl RedisStreamQueue {
    /// Open a managed connection to the broker
    pub async fn connect(url: &str, consumer: StreamConsumer) -> QueueResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::debug!(
            group = %consumer.group,
            consumer = %consumer.name,
            "Connected export queue to Redis"
        );
        Ok(Self::new(connection, consumer))
    }

    pub fn new(connection: ConnectionManager, consumer: StreamConsumer) -> Self {
        Self {
            connection,
            consumer,
            drained: Mutex::new(HashSet::new()),
        }
    }

    /// Round-trip a PING, for readiness checks
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn drained(&self) -> MutexGuard<'_, HashSet<String>> {
        self.drained.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn append(&self, channel: &str, payload: &[u8], attempt: u32) -> QueueResult<String> {
        let mut conn = self.connection.clone();
        let fields = [
            (PAYLOAD_FIELD, payload.to_vec()),
            (ATTEMPT_FIELD, attempt.to_string().into_bytes()),
        ];
        let id: String = conn.xadd(channel, "*", &fields).await?;
        Ok(id)
    }

    fn decode(entry: &StreamId, redelivered: bool) -> QueueResult<Delivery> {
        let payload: Vec<u8> = entry
            .get(PAYLOAD_FIELD)
            .ok_or_else(|| QueueError::invalid_delivery(&entry.id, "missing payload field"))?;
        let attempt: u32 = entry.get(ATTEMPT_FIELD).unwrap_or(1);

        Ok(Delivery {
            id: entry.id.clone(),
            payload,
            attempt,
            redelivered,
        })
    }
}

#[async_trait]
impl MessageQueue for RedisStreamQueue {
    async fn ensure_channel(&self, channel: &str) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let created: RedisResult<()> = conn
            .xgroup_create_mkstream(channel, &self.consumer.group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(channel, group = %self.consumer.group, "Created export stream group");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> QueueResult<()> {
        let id = self.append(channel, payload, 1).await?;
        tracing::debug!(channel, message_id = %id, "Published message");
        Ok(())
    }

    async fn receive(&self, channel: &str) -> QueueResult<Delivery> {
        loop {
            let reading_pending = !self.drained().contains(channel);
            let start_id = if reading_pending { "0" } else { ">" };

            let mut options = StreamReadOptions::default()
                .group(&self.consumer.group, &self.consumer.name)
                .count(1);
            if !reading_pending {
                options = options.block(self.consumer.block_ms);
            }

            let mut conn = self.connection.clone();
            let reply: Option<StreamReadReply> =
                match conn.xread_options(&[channel], &[start_id], &options).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        // After a reconnect our pending list has to be read again
                        self.drained().clear();
                        return Err(e.into());
                    }
                };

            let entry = reply
                .and_then(|reply| reply.keys.into_iter().next())
                .and_then(|key| key.ids.into_iter().next());

            match entry {
                Some(entry) => match Self::decode(&entry, reading_pending) {
                    Ok(delivery) => {
                        if reading_pending {
                            tracing::info!(channel, message_id = %entry.id, "Redelivering pending message");
                        }
                        return Ok(delivery);
                    }
                    Err(e) => {
                        // Trimmed from the stream or not written by us
                        tracing::warn!(channel, message_id = %entry.id, error = %e, "Dropping undecodable stream entry");
                        let _: i64 = conn
                            .xack(channel, &self.consumer.group, &[&entry.id])
                            .await?;
                    }
                },
                None if reading_pending => {
                    self.drained().insert(channel.to_string());
                }
                None => {}
            }
        }
    }

    async fn ack(&self, channel: &str, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let acked: i64 = conn
            .xack(channel, &self.consumer.group, &[&delivery.id])
            .await?;
        if acked == 0 {
            return Err(QueueError::invalid_delivery(
                &delivery.id,
                "not pending for this group",
            ));
        }
        Ok(())
    }

    async fn nack(&self, channel: &str, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        if requeue {
            // Append before acking: a crash in between duplicates the job
            // instead of losing it
            let id = self
                .append(channel, &delivery.payload, delivery.attempt + 1)
                .await?;
            tracing::debug!(
                channel,
                message_id = %delivery.id,
                requeued_as = %id,
                attempt = delivery.attempt + 1,
                "Requeued message"
            );
        }
        self.ack(channel, delivery).await
    }

    async fn release_unsettled(&self, channel: &str) -> QueueResult<()> {
        // Entries stay in our pending list; re-read it from id 0
        self.drained().remove(channel);
        Ok(())
    }
}
