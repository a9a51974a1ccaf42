//! Error types for queue operations

use thiserror::Error;

/// Errors raised by a [`MessageQueue`](crate::MessageQueue) backend
#[derive(Error, Debug)]
pub enum QueueError {
    /// The Redis broker rejected a command or the connection dropped
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A job could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A broker entry did not have the expected shape
    #[error("invalid delivery {id}: {reason}")]
    InvalidDelivery { id: String, reason: String },
}

impl QueueError {
    pub fn invalid_delivery(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDelivery {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
