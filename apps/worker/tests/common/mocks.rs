//! Mock collaborators for worker integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use openmusic_export_queue::{Delivery, InMemoryQueue, MessageQueue, QueueError, QueueResult};
use openmusic_worker::{
    ExportMail, ExportSong, MailTransport, PlaylistRecord, PlaylistStore, WorkerError,
    WorkerResult,
};

/// Playlist store held in memory
///
/// Songs keep the order they were added in, standing in for the database's
/// membership row order.
#[derive(Default)]
pub struct InMemoryPlaylistStore {
    playlists: Mutex<HashMap<String, (String, Vec<ExportSong>)>>,
}

impl InMemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, name: &str, songs: Vec<ExportSong>) {
        self.playlists
            .lock()
            .unwrap()
            .insert(id.to_string(), (name.to_string(), songs));
    }

    pub fn delete(&self, id: &str) {
        self.playlists.lock().unwrap().remove(id);
    }
}

#[async_trait]
impl PlaylistStore for InMemoryPlaylistStore {
    async fn find_playlist(&self, playlist_id: &str) -> WorkerResult<Option<PlaylistRecord>> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|(name, _)| PlaylistRecord {
                id: playlist_id.to_string(),
                name: name.clone(),
            }))
    }

    async fn find_songs(&self, playlist_id: &str) -> WorkerResult<Vec<ExportSong>> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .get(playlist_id)
            .map(|(_, songs)| songs.clone())
            .unwrap_or_default())
    }
}

/// Shared, ordered record of what the mock transports did
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Transport that accepts every mail and keeps a copy
#[derive(Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<ExportMail>>,
    log: EventLog,
    delay: Option<Duration>,
}

impl RecordingMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `send-start:<to>` and `send-end:<to>` around a simulated slow send
    pub fn slow(log: EventLog, delay: Duration) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            log,
            delay: Some(delay),
        }
    }

    pub fn sent(&self) -> Vec<ExportMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn deliver(&self, mail: &ExportMail) -> WorkerResult<()> {
        self.log.push(format!("send-start:{}", mail.destination));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(mail.clone());
        self.log.push(format!("send-end:{}", mail.destination));
        Ok(())
    }
}

/// Transport that fails the first `failures` sends, then accepts
pub struct FlakyMailTransport {
    failures: usize,
    attempts: AtomicUsize,
    sent: Mutex<Vec<ExportMail>>,
}

impl FlakyMailTransport {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Never succeeds
    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for FlakyMailTransport {
    async fn deliver(&self, mail: &ExportMail) -> WorkerResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(WorkerError::Delivery(
                "421 service not available".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// In-memory queue with injectable broker faults
///
/// Shares its channels with the wrapped [`InMemoryQueue`], so the harness
/// can still inspect what is ready and what is unsettled.
pub struct FaultyQueue {
    inner: InMemoryQueue,
    failing_acks: AtomicUsize,
    broken_channel: Option<String>,
    receives: AtomicUsize,
}

impl FaultyQueue {
    pub fn new(inner: InMemoryQueue) -> Self {
        Self {
            inner,
            failing_acks: AtomicUsize::new(0),
            broken_channel: None,
            receives: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` acks without settling the message
    pub fn failing_acks(self, count: usize) -> Self {
        self.failing_acks.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every publish to `channel`
    pub fn failing_publish_to(mut self, channel: &str) -> Self {
        self.broken_channel = Some(channel.to_string());
        self
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }
}

fn connection_reset(id: &str) -> QueueError {
    QueueError::invalid_delivery(id, "connection reset")
}

#[async_trait]
impl MessageQueue for FaultyQueue {
    async fn ensure_channel(&self, channel: &str) -> QueueResult<()> {
        self.inner.ensure_channel(channel).await
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> QueueResult<()> {
        if self.broken_channel.as_deref() == Some(channel) {
            return Err(connection_reset(channel));
        }
        self.inner.publish(channel, payload).await
    }

    async fn receive(&self, channel: &str) -> QueueResult<Delivery> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        self.inner.receive(channel).await
    }

    async fn ack(&self, channel: &str, delivery: &Delivery) -> QueueResult<()> {
        let failed = self
            .failing_acks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(connection_reset(&delivery.id));
        }
        self.inner.ack(channel, delivery).await
    }

    async fn nack(&self, channel: &str, delivery: &Delivery, requeue: bool) -> QueueResult<()> {
        self.inner.nack(channel, delivery, requeue).await
    }

    async fn release_unsettled(&self, channel: &str) -> QueueResult<()> {
        self.inner.release_unsettled(channel).await
    }
}
