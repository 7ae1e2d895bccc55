//! File-version tracking on top of replicated feeds.
//!
//! A tracked file is a small DAG of versions, each one a changelist applied
//! against the version it depends on. [`graph::VersionGraph`] extracts that
//! DAG from a file's update-feed segments; [`manager::VersionManager`]
//! drives it: appending new versions, rotating onto a fresh update feed
//! after an emergency, and moving a file's in-memory content between
//! versions by applying or reverting changelists along a shortest path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod edit;
pub mod error;
pub mod graph;
pub mod manager;
pub mod state;

pub use edit::EditOp;
pub use error::VersionError;
pub use graph::VersionGraph;
pub use manager::{ApplyOutcome, VersionManager};
pub use state::{FileTrack, UpdateSegment, VersionManagerState};
