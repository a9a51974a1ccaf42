//! Export consume loop
//!
//! Messages are taken one at a time: the next receive does not start until
//! the current message has been settled. Per message:
//!
//! ```text
//! received -> processing -> acknowledged
//!                        -> requeued      (retryable error, attempts left)
//! ```
//!
//! A payload that does not parse is acknowledged straight away since it can
//! never succeed. A job that fails for good is acknowledged too, after an
//! optional copy to the dead-letter channel.
//!
//! If settling itself fails (ack, requeue or dead-letter publish), the
//! message is released back to the channel and the loop backs off before
//! receiving again.

use std::sync::Arc;
use std::time::Duration;

use openmusic_export_queue::{Delivery, ExportJob, MessageQueue};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{ConsumerSettings, FailurePolicy};
use crate::error::{WorkerError, WorkerResult};
use crate::jobs::playlist_export;
use crate::AppState;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How a single message was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Mail sent, message acknowledged
    Exported,
    /// Failed for good and acknowledged without a copy
    Dropped,
    /// Failed for good, copied to the dead-letter channel, then acknowledged
    DeadLettered,
    /// Put back on the channel for another attempt
    Requeued,
}

/// Exponential delay after a failed receive or settle
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_BACKOFF,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.next = INITIAL_BACKOFF;
    }
}

/// Sequential consumer of the export channel
pub struct ExportWorker {
    state: AppState,
    queue: Arc<dyn MessageQueue>,
    settings: ConsumerSettings,
}

impl ExportWorker {
    pub fn new(state: AppState, queue: Arc<dyn MessageQueue>, settings: ConsumerSettings) -> Self {
        Self {
            state,
            queue,
            settings,
        }
    }

    /// Wait for one message and settle it
    ///
    /// On a settle error the message has already been released for
    /// redelivery when this returns.
    pub async fn process_next(&self) -> WorkerResult<ExportOutcome> {
        let delivery = self.queue.receive(&self.settings.channel).await?;
        self.settle(delivery).await
    }

    /// Consume until `shutdown` fires
    ///
    /// Cancellation only interrupts the wait for the next message; a message
    /// already being processed is finished and settled first. Broker errors
    /// and failed settles never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut backoff = Backoff::new();

        tracing::info!(
            channel = %self.settings.channel,
            max_attempts = self.settings.max_attempts,
            failure_policy = %self.settings.failure_policy,
            "Export worker started"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.queue.receive(&self.settings.channel) => received,
            };

            let failure = match received {
                Ok(delivery) => match self.settle(delivery).await {
                    Ok(outcome) => {
                        tracing::debug!(?outcome, "Message settled");
                        None
                    }
                    Err(e) => {
                        e.log();
                        Some("Failed to settle message, backing off")
                    }
                },
                Err(e) => {
                    WorkerError::from(e).log();
                    Some("Failed to receive from queue, backing off")
                }
            };

            match failure {
                None => backoff.reset(),
                Some(reason) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(delay_secs = delay.as_secs(), "{}", reason);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("Export worker stopped");
    }

    async fn settle(&self, delivery: Delivery) -> WorkerResult<ExportOutcome> {
        let result = self.handle(delivery).await;
        if result.is_err() {
            if let Err(e) = self.queue.release_unsettled(&self.settings.channel).await {
                WorkerError::from(e).log();
            }
        }
        result
    }

    async fn handle(&self, delivery: Delivery) -> WorkerResult<ExportOutcome> {
        if delivery.redelivered {
            tracing::warn!(message_id = %delivery.id, "Processing redelivered message");
        }

        let job = match ExportJob::from_payload(&delivery.payload) {
            Ok(job) => job,
            Err(e) => {
                WorkerError::InvalidJobData(e.to_string()).log();
                return self.fail_terminally(&delivery).await;
            }
        };

        let span = tracing::info_span!(
            "export",
            message_id = %delivery.id,
            playlist_id = %job.playlist_id,
            attempt = delivery.attempt
        );

        self.process_job(&delivery, &job).instrument(span).await
    }

    async fn process_job(&self, delivery: &Delivery, job: &ExportJob) -> WorkerResult<ExportOutcome> {
        tracing::debug!(target_email = %job.target_email, "Export job received");

        match playlist_export::execute(&self.state, job).await {
            Ok(_) => {
                self.queue.ack(&self.settings.channel, delivery).await?;
                Ok(ExportOutcome::Exported)
            }
            Err(e) => {
                e.log();
                if e.is_retryable() && delivery.attempt < self.settings.max_attempts {
                    self.queue.nack(&self.settings.channel, delivery, true).await?;
                    tracing::warn!(
                        next_attempt = delivery.attempt + 1,
                        max_attempts = self.settings.max_attempts,
                        "Export requeued"
                    );
                    Ok(ExportOutcome::Requeued)
                } else {
                    self.fail_terminally(delivery).await
                }
            }
        }
    }

    async fn fail_terminally(&self, delivery: &Delivery) -> WorkerResult<ExportOutcome> {
        let outcome = match self.settings.failure_policy {
            FailurePolicy::Drop => ExportOutcome::Dropped,
            FailurePolicy::DeadLetter => {
                self.queue
                    .publish(&self.settings.dead_letter_channel, &delivery.payload)
                    .await?;
                ExportOutcome::DeadLettered
            }
        };

        self.queue.ack(&self.settings.channel, delivery).await?;
        tracing::warn!(message_id = %delivery.id, ?outcome, "Export abandoned");
        Ok(outcome)
    }
}
