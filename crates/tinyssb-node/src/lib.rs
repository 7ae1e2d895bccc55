//! Binary-facing glue for the tinyssb node: CLI parsing, config persistence,
//! and the [`Node`] type that wires the replication and version-control
//! crates together into a runnable service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod node;

pub use cli::{Cli, Command};
pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
