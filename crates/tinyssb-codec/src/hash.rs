//! SHA-256 helpers used for message ids, DMX derivation, and blob pointers.

use sha2::{Digest as _, Sha256};

/// A full 32-byte SHA-256 digest.
pub type Digest32 = [u8; 32];

/// Hash `parts` in order, concatenated, returning the full 32-byte digest.
///
/// Message ids, DMX tags, and blob pointers are all truncations of this
/// digest, so every derivation site calls `digest` once and slices the
/// prefix it needs rather than re-deriving its own hasher plumbing.
#[must_use]
pub fn digest(parts: &[&[u8]]) -> Digest32 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// First 7 bytes of `digest(parts)`, used for DMX tags.
#[must_use]
pub fn digest7(parts: &[&[u8]]) -> [u8; 7] {
    let full = digest(parts);
    let mut out = [0u8; 7];
    out.copy_from_slice(&full[..7]);
    out
}

/// First 20 bytes of `digest(parts)`, used for message ids and blob pointers.
#[must_use]
pub fn digest20(parts: &[&[u8]]) -> [u8; 20] {
    let full = digest(parts);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest(&[b"a", b"b"]), digest(&[b"ab"]));
    }

    #[test]
    fn truncations_are_prefixes_of_the_full_digest() {
        let full = digest(&[b"hello"]);
        assert_eq!(&digest7(&[b"hello"])[..], &full[..7]);
        assert_eq!(&digest20(&[b"hello"])[..], &full[..20]);
    }
}
