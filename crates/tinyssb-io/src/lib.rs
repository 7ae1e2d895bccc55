//! Socket I/O for tinyssb: a broadcast [`Transport`] and the RX/TX/want-fill
//! thread loop ([`IoLoop`]) that drives a [`tinyssb_replicate::FeedManager`]
//! from it.
//!
//! Kept separate from `tinyssb-replicate` so the replication state machine
//! stays Sans-IO: nothing in that crate touches a socket or a thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
#[path = "loop.rs"]
pub mod io_loop;
pub mod transport;

pub use error::IoError;
pub use io_loop::IoLoop;
pub use transport::{ChannelTransport, Transport, UdpTransport, MAX_DATAGRAM_SIZE};
