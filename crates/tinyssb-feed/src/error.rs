//! Feed error types.
//!
//! Defines errors that can occur while opening, appending to, or reading a
//! feed's on-disk log. Network-facing rejections (bad signature, bad DMX)
//! are not `Err` here — [`crate::feed::Feed::verify_and_append`] reports
//! those as a `bool`/outcome so the replication layer can drop silently
//! without treating them as I/O failures.

use thiserror::Error;

/// Errors that can occur during feed operations.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A fixed-size record did not contain enough bytes.
    #[error("truncated record: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },

    /// The requested feed does not exist on disk.
    #[error("feed not found: {0}")]
    NotFound(String),

    /// A sequence number was out of the feed's current bounds.
    #[error("sequence {seq} out of range ({anchor}..={front})")]
    OutOfRange {
        /// Requested sequence number.
        seq: i64,
        /// Oldest sequence number on disk.
        anchor: u32,
        /// Newest sequence number on disk.
        front: u32,
    },

    /// A blob chain could not be fully reassembled because a frame is
    /// still missing.
    #[error("blob chain incomplete: missing frame {0}")]
    ChainIncomplete(String),

    /// This feed's private key is not held by this process.
    #[error("no signing key for feed {0}")]
    NoSigningKey(String),

    /// Underlying file-system error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Io(err.to_string())
    }
}
