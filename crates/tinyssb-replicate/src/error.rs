//! Feed manager error types.

use thiserror::Error;

/// Errors that can occur while replicating feeds.
#[derive(Error, Debug)]
pub enum ReplicateError {
    /// The requested feed is not known to this manager.
    #[error("unknown feed: {0}")]
    UnknownFeed(String),

    /// An operation that requires producing into a feed was attempted
    /// without holding that feed's private key.
    #[error("no signing key for feed {0}")]
    NoSigningKey(String),

    /// A malformed want/packet/blob frame was received.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Underlying feed storage error.
    #[error(transparent)]
    Feed(#[from] tinyssb_feed::FeedError),
}
