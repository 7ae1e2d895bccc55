//! Wire-level primitives shared by every tinyssb crate.
//!
//! # Components
//!
//! - [`varint`]: the little-endian VarInt codec used for blob lengths and
//!   change-list records.
//! - [`constants`]: packet type codes, the protocol name prefix, and frame
//!   sizes.
//! - [`signer`]: an abstract [`Signer`]/[`Verifier`] pair over Ed25519, kept
//!   behind a trait so an HMAC-based drop-in stays possible without touching
//!   callers.
//! - [`hash`]: thin wrappers around SHA-256 for message ids, DMX derivation,
//!   and blob pointers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod hash;
pub mod signer;
pub mod varint;

pub use constants::{PacketType, NAME_PREFIX, WANT_SUFFIX};
pub use hash::{digest, Digest32};
pub use signer::{Signature64, Signer, Verifier};
pub use varint::{decode as varint_decode, encode as varint_encode, VarIntError};
