//! Worker harness and data fixtures

use std::sync::Arc;

use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use openmusic_export_queue::{ExportJob, InMemoryQueue, MessageQueue, EXPORT_PLAYLIST_CHANNEL};
use openmusic_worker::{
    AppState, ConsumerSettings, ExportSong, ExportWorker, FailurePolicy, MailTransport,
    NotificationSender, PlaylistAggregator,
};

use super::mocks::{FaultyQueue, InMemoryPlaylistStore, RecordingMailTransport};

pub fn song(id: &str, title: &str, performer: &str) -> ExportSong {
    ExportSong {
        id: id.to_string(),
        title: title.to_string(),
        performer: performer.to_string(),
    }
}

pub fn fake_email() -> String {
    SafeEmail().fake()
}

/// An [`ExportWorker`] over an in-memory queue and store
pub struct WorkerHarness {
    pub queue: InMemoryQueue,
    pub state: AppState,
    pub store: Arc<InMemoryPlaylistStore>,
    pub worker: ExportWorker,
}

impl WorkerHarness {
    /// Default settings: one attempt, drop on failure
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self::with_settings(transport, ConsumerSettings::default())
    }

    pub fn with_settings(transport: Arc<dyn MailTransport>, settings: ConsumerSettings) -> Self {
        Self::build(transport, settings, |queue| Arc::new(queue) as Arc<dyn MessageQueue>)
    }

    /// Worker reading through a [`FaultyQueue`] set up by `faults`
    pub fn with_faults(
        transport: Arc<dyn MailTransport>,
        settings: ConsumerSettings,
        faults: impl FnOnce(FaultyQueue) -> FaultyQueue,
    ) -> (Self, Arc<FaultyQueue>) {
        let mut faulty = None;
        let harness = Self::build(transport, settings, |queue| {
            let queue = Arc::new(faults(FaultyQueue::new(queue)));
            faulty = Some(queue.clone());
            queue as Arc<dyn MessageQueue>
        });
        let faulty = faulty.expect("build wraps the queue");
        (harness, faulty)
    }

    fn build(
        transport: Arc<dyn MailTransport>,
        settings: ConsumerSettings,
        wrap: impl FnOnce(InMemoryQueue) -> Arc<dyn MessageQueue>,
    ) -> Self {
        let queue = InMemoryQueue::new();
        let store = Arc::new(InMemoryPlaylistStore::new());

        let state = AppState::new(
            PlaylistAggregator::new(store.clone()),
            NotificationSender::new(transport),
        );
        let worker = ExportWorker::new(state.clone(), wrap(queue.clone()), settings);

        Self {
            queue,
            state,
            store,
            worker,
        }
    }

    pub fn recording() -> (Self, Arc<RecordingMailTransport>) {
        let transport = Arc::new(RecordingMailTransport::new());
        (Self::new(transport.clone()), transport)
    }

    pub async fn enqueue(&self, playlist_id: &str, target_email: &str) -> ExportJob {
        let job = ExportJob::new(playlist_id, target_email);
        self.queue
            .publish(EXPORT_PLAYLIST_CHANNEL, &job.to_payload().unwrap())
            .await
            .unwrap();
        job
    }

    /// Messages still waiting plus messages delivered but not settled
    pub fn outstanding(&self) -> usize {
        self.queue.ready_len(EXPORT_PLAYLIST_CHANNEL)
            + self.queue.unacked_len(EXPORT_PLAYLIST_CHANNEL)
    }
}

pub fn retry_settings(max_attempts: u32, failure_policy: FailurePolicy) -> ConsumerSettings {
    ConsumerSettings {
        max_attempts,
        failure_policy,
        ..ConsumerSettings::default()
    }
}
