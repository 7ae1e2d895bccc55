//! Signing primitive abstraction.
//!
//! The wire format reserves a 64-byte signature slot but does not mandate a
//! particular algorithm. [`Signer`]/[`Verifier`] keep that slot abstract so
//! an HMAC-SHA-256 (zero-padded to 64 bytes) drop-in stays possible without
//! touching any caller; the concrete implementation shipped here is Ed25519
//! via `ed25519-dalek`.

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use thiserror::Error;

/// A 64-byte signature, matching the wire packet's signature slot.
pub type Signature64 = [u8; 64];

/// Errors produced while signing or verifying.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The supplied key material was not a valid key of the expected size.
    #[error("invalid key material")]
    InvalidKey,
    /// Signature verification failed.
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Produces signatures over arbitrary byte slices.
pub trait Signer {
    /// Sign `message`, returning a 64-byte signature.
    fn sign(&self, message: &[u8]) -> Signature64;
}

/// Verifies signatures produced by a [`Signer`].
pub trait Verifier {
    /// Verify `signature` over `message`, under this verifier's key.
    fn verify(&self, message: &[u8], signature: &Signature64) -> Result<(), SignerError>;
}

/// Ed25519 signer wrapping a 32-byte seed.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Build a signer from a 32-byte seed (the feed's private key).
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self { key: SigningKey::from_bytes(seed) }
    }

    /// The 32-byte public key (feed id) matching this signer.
    #[must_use]
    pub fn verifying_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Signature64 {
        self.key.sign(message).to_bytes()
    }
}

/// Ed25519 verifier wrapping a 32-byte public key (a feed id).
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Build a verifier from a feed's 32-byte public key.
    pub fn from_public_key(fid: &[u8; 32]) -> Result<Self, SignerError> {
        Ok(Self { key: VerifyingKey::from_bytes(fid).map_err(|_| SignerError::InvalidKey)? })
    }
}

impl Verifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &Signature64) -> Result<(), SignerError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.key.verify(message, &sig).map_err(|_| SignerError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = SigningKey::generate(&mut OsRng);
        let seed = key.to_bytes();
        let signer = Ed25519Signer::from_seed(&seed);
        let fid = signer.verifying_key();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();

        let msg = b"tinyssb wire packet bytes";
        let sig = signer.sign(msg);
        assert!(verifier.verify(msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = SigningKey::generate(&mut OsRng);
        let signer = Ed25519Signer::from_seed(&key.to_bytes());
        let fid = signer.verifying_key();
        let verifier = Ed25519Verifier::from_public_key(&fid).unwrap();

        let sig = signer.sign(b"original");
        assert_eq!(verifier.verify(b"tampered!", &sig), Err(SignerError::VerificationFailed));
    }

    #[test]
    fn invalid_public_key_is_rejected() {
        // All-0xFF is not a valid compressed Edwards point.
        let bad = [0xFFu8; 32];
        assert!(matches!(Ed25519Verifier::from_public_key(&bad), Err(SignerError::InvalidKey)));
    }
}
