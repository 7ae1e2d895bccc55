//! Command-line surface for the `tinyssb-node` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A tinyssb replication node.
#[derive(Debug, Parser)]
#[command(name = "tinyssb-node", about = "A tiny append-only log replication node")]
pub struct Cli {
    /// Directory the node's feeds, blobs, and config are rooted at.
    #[arg(long, global = true, default_value = ".")]
    pub base_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands accepted by the node binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the directory structure and default config for a new node.
    Init,

    /// Remove all feed, blob, and config state, keeping the base directory.
    Clean,

    /// Start the node's replication loop and block until interrupted.
    Run {
        /// Also serve a read-only HTTP status endpoint.
        #[arg(long)]
        http: bool,
    },

    /// `clean` followed immediately by `init` and `run`.
    CleanRun {
        /// Also serve a read-only HTTP status endpoint.
        #[arg(long)]
        http: bool,
    },

    /// Register a new file under version control and print its update and
    /// emergency feed ids.
    Track {
        /// Name of the file to start tracking.
        file_name: String,
    },
}
