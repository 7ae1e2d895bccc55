//! Replication: the DMX-driven feed manager.
//!
//! # Architecture
//!
//! [`FeedManager`] is the Sans-IO core of replication: [`FeedManager::handle_want`],
//! [`FeedManager::handle_packet`], and [`FeedManager::handle_blob`] take raw
//! 128-byte frames already classified and routed by [`FeedManager::consult_dmx`]
//! (the actual socket I/O lives in `tinyssb-io`). [`dmx::DmxTable`] and the
//! callback registry are the two independently-lockable pieces of shared
//! state described in the concurrency model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dmx;
pub mod error;
pub mod keystore;
pub mod manager;
pub mod render;
pub mod want;

pub use dmx::{DmxEntry, DmxTable};
pub use error::ReplicateError;
pub use keystore::KeyStore;
pub use manager::{Callback, FeedManager};
pub use render::render_tree;
