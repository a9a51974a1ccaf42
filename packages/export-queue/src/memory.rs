//! In-process queue with broker-like ack semantics
//!
//! Nothing here survives a process restart, so this backend only makes
//! sense when producer and consumer share a process: tests, and local
//! experiments without Redis.
//!
//! # Lock Poisoning Recovery
//!
//! Locks are taken with `unwrap_or_else(|e| e.into_inner())` so a panicking
//! test does not poison the queue for the next one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::job::ExportJob;
use crate::{Delivery, MessageQueue};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    payload: Vec<u8>,
    attempt: u32,
    redelivered: bool,
}

impl StoredMessage {
    fn fresh(payload: Vec<u8>, attempt: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            attempt,
            redelivered: false,
        }
    }

    fn to_delivery(&self) -> Delivery {
        Delivery {
            id: self.id.clone(),
            payload: self.payload.clone(),
            attempt: self.attempt,
            redelivered: self.redelivered,
        }
    }
}

#[derive(Default)]
struct ChannelState {
    ready: VecDeque<StoredMessage>,
    /// Delivered but unsettled, in delivery order
    unacked: Vec<StoredMessage>,
    notify: Arc<Notify>,
}

impl ChannelState {
    fn take_unacked(&mut self, id: &str) -> QueueResult<StoredMessage> {
        let index = self
            .unacked
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| QueueError::invalid_delivery(id, "unknown or already settled"))?;
        Ok(self.unacked.remove(index))
    }
}

/// In-memory [`MessageQueue`]
///
/// Clones share the same channels.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    channels: Arc<Mutex<HashMap<String, ChannelState>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ChannelState>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Payloads waiting on the channel, oldest first
    pub fn pending_payloads(&self, channel: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get(channel)
            .map(|state| state.ready.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default()
    }

    /// Waiting payloads decoded as export jobs; undecodable entries are skipped
    pub fn pending_jobs(&self, channel: &str) -> Vec<ExportJob> {
        self.pending_payloads(channel)
            .iter()
            .filter_map(|payload| ExportJob::from_payload(payload).ok())
            .collect()
    }

    /// Number of messages waiting to be delivered
    pub fn ready_len(&self, channel: &str) -> usize {
        self.lock().get(channel).map_or(0, |state| state.ready.len())
    }

    /// Number of messages delivered but not yet settled
    pub fn unacked_len(&self, channel: &str) -> usize {
        self.lock().get(channel).map_or(0, |state| state.unacked.len())
    }

    /// Simulate the consumer going away
    ///
    /// Every unsettled message is put back at the head of the channel, in
    /// its original delivery order, and flagged as redelivered. Returns how
    /// many messages were recovered.
    pub fn recover_unacked(&self, channel: &str) -> usize {
        let mut channels = self.lock();
        let Some(state) = channels.get_mut(channel) else {
            return 0;
        };

        let recovered: Vec<StoredMessage> = state.unacked.drain(..).collect();
        let count = recovered.len();
        for mut message in recovered.into_iter().rev() {
            message.redelivered = true;
            state.ready.push_front(message);
        }
        if count > 0 {
            state.notify.notify_one();
        }
        count
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn ensure_channel(&self, channel: &str) -> QueueResult<()> {
        self.lock().entry(channel.to_string()).or_default();
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> QueueResult<()> {
        let mut channels = self.lock();
        let state = channels.entry(channel.to_string()).or_default();
        state.ready.push_back(StoredMessage::fresh(payload.to_vec(), 1));
        state.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, channel: &str) -> QueueResult<Delivery> {
        loop {
            let notify = {
                let mut channels = self.lock();
                let state = channels.entry(channel.to_string()).or_default();
                if let Some(message) = state.ready.pop_front() {
                    let delivery = message.to_delivery();
                    state.unacked.push(message);
                    return Ok(delivery);
                }
                state.notify.clone()
            };
            // notify_one stores a permit, so a publish between the unlock
            // above and this await is not lost
            notify.notified().await;
        }
    }

    async fn ack(&self, channel: &str, delivery: &Delivery) -> QueueResult<()> {
        let mut channels = self.lock();
        let state = channels
            .get_mut(channel)
            .ok_or_else(|| QueueError::invalid_delivery(&delivery.id, "unknown channel"))?;
        state.take_unacked(&delivery.id)?;
        Ok(())
    }

    async fn nack(&self, channel: &str, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        let mut channels = self.lock();
        let state = channels
            .get_mut(channel)
            .ok_or_else(|| QueueError::invalid_delivery(&delivery.id, "unknown channel"))?;
        let message = state.take_unacked(&delivery.id)?;

        if requeue {
            state
                .ready
                .push_back(StoredMessage::fresh(message.payload, message.attempt + 1));
            state.notify.notify_one();
        }
        Ok(())
    }

    async fn release_unsettled(&self, channel: &str) -> QueueResult<()> {
        self.recover_unacked(channel);
        Ok(())
    }
}
