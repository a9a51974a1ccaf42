//! Error handling for the export worker
//!
//! Every failure inside the consume loop ends up as a [`WorkerError`]. The
//! loop never propagates these past a single message; it logs them and
//! decides between acknowledging, requeueing and dead-lettering based on
//! [`WorkerError::is_retryable`].

use openmusic_export_queue::QueueError;
use thiserror::Error;

/// Main worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Job Errors ==========
    /// Job payload could not be parsed or carries unusable fields
    #[error("invalid job data: {0}")]
    InvalidJobData(String),

    /// The playlist referenced by the job no longer exists
    #[error("not found: {0}")]
    NotFound(String),

    // ========== Mail Errors ==========
    /// The mail transport rejected or failed the send
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The export mail could not be assembled
    #[error("failed to build export mail: {0}")]
    MailBuild(String),

    // ========== Infrastructure Errors ==========
    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Broker operation failed
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    // ========== Configuration Errors ==========
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Catch-all for unexpected errors
    #[error("internal worker error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Whether another attempt at the same job could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Delivery(_) | Self::Database(_) | Self::Queue(_))
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Configuration(_) => ErrorSeverity::Critical,

            Self::Database(_) | Self::Queue(_) | Self::MailBuild(_) | Self::Internal(_) => {
                ErrorSeverity::Error
            }

            Self::Delivery(_) | Self::InvalidJobData(_) => ErrorSeverity::Warning,

            // A playlist deleted after the export was requested is routine
            Self::NotFound(_) => ErrorSeverity::Info,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %self,
                    retryable = self.is_retryable(),
                    "Critical worker error"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %self,
                    retryable = self.is_retryable(),
                    "Worker error"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %self,
                    retryable = self.is_retryable(),
                    "Worker warning"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %self,
                    retryable = self.is_retryable(),
                    "Worker info"
                );
            }
        }
    }

    pub fn playlist_not_found(playlist_id: &str) -> Self {
        Self::NotFound(format!("playlist {}", playlist_id))
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

// ========== Conversion Implementations ==========

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<WorkerError>() {
            Ok(worker_err) => worker_err,
            Err(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for WorkerError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Delivery(err.to_string())
    }
}

impl From<lettre::error::Error> for WorkerError {
    fn from(err: lettre::error::Error) -> Self {
        Self::MailBuild(err.to_string())
    }
}
