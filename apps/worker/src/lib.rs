//! OpenMusic export worker
//!
//! Consumes [`ExportJob`](openmusic_export_queue::ExportJob)s from the
//! `export:playlist` channel one at a time, aggregates the playlist from
//! PostgreSQL and mails it to the requester.

pub mod aggregator;
pub mod config;
pub mod consumer;
pub mod error;
pub mod jobs;
pub mod mailer;

pub use aggregator::{
    ExportSong, PgPlaylistStore, PlaylistAggregator, PlaylistExport, PlaylistRecord,
    PlaylistStore, ReadConsistency,
};
pub use config::{Config, ConsumerSettings, FailurePolicy};
pub use consumer::{ExportOutcome, ExportWorker};
pub use error::{ErrorSeverity, WorkerError, WorkerResult};
pub use mailer::{ExportMail, MailTransport, NotificationSender, SmtpMailTransport};

/// Handles shared by every job the worker runs
#[derive(Clone)]
pub struct AppState {
    pub aggregator: PlaylistAggregator,
    pub sender: NotificationSender,
}

impl AppState {
    pub fn new(aggregator: PlaylistAggregator, sender: NotificationSender) -> Self {
        Self { aggregator, sender }
    }
}
