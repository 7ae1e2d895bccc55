//! I/O loop error types.

use thiserror::Error;

/// Errors that can occur in the transport or dispatch loop.
#[derive(Error, Debug)]
pub enum IoError {
    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Underlying replication error while dispatching a received frame.
    #[error(transparent)]
    Replicate(#[from] tinyssb_replicate::ReplicateError),

    /// Underlying feed storage error.
    #[error(transparent)]
    Feed(#[from] tinyssb_feed::FeedError),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        IoError::Io(err.to_string())
    }
}
