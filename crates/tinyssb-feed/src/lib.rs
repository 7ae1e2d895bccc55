//! Append-only, hash-chained feed log.
//!
//! # Architecture
//!
//! A feed is one producer's signed append-only log, persisted as a fixed
//! 128-byte header (cursors + topology) and a growing log of 120-byte wire
//! packets. Content that doesn't fit a single packet is spread across a
//! content-addressed blob side-chain (see [`blob`]).
//!
//! [`feed::Feed`] owns a single feed's files and exposes the producer path
//! (`append_payload`/`append_blob`) and the consumer path
//! (`verify_and_append`/`verify_and_append_blob`), both specified in terms
//! of the hash-chain invariants in [`packet`]. [`store::FeedStore`] answers
//! directory-wide topology questions (listing feeds, children, predecessors)
//! that a single feed's header can't.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blob;
pub mod error;
pub mod feed;
pub mod header;
pub mod packet;
pub mod store;

pub use blob::{BlobFrame, ChainHead};
pub use error::FeedError;
pub use feed::{Feed, Want};
pub use header::FeedHeader;
pub use packet::WirePacket;
pub use store::FeedStore;
