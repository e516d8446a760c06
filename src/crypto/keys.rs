//! X25519 key pairs and Diffie-Hellman shared-secret derivation.

use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A Curve25519 key pair: 32-byte public key, 32-byte clamped private key.
///
/// The private half is zeroized on drop. Cloning is intentionally not
/// derived — a caller that needs a second copy of the private key should
/// go through [`KeyPair::from_private`] so it's clear a duplication (and
/// therefore a second zeroization obligation) is happening.
pub struct KeyPair {
    /// The public key, safe to share.
    pub public: [u8; 32],
    /// The clamped private scalar. Zeroized on drop.
    pub(crate) private: [u8; 32],
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

impl KeyPair {
    /// Generates a fresh key pair from the OS CSPRNG.
    ///
    /// Fails only if the RNG itself fails, which `OsRng` does not do on any
    /// supported platform in practice — the `Result` return exists to keep
    /// the signature honest about where randomness could, in principle,
    /// fail.
    pub fn generate() -> Result<Self> {
        let mut private = [0u8; 32];
        OsRng.fill_bytes(&mut private);
        Ok(Self::from_private(private))
    }

    /// Builds a key pair from an existing 32-byte private scalar, clamping
    /// it per RFC 7748 and deriving the public key via scalar-base-mult.
    pub fn from_private(mut private: [u8; 32]) -> Self {
        clamp_scalar(&mut private);
        let public = x25519_dalek::x25519(private, x25519_dalek::X25519_BASEPOINT_BYTES);
        Self { public, private }
    }

    /// Returns a copy of the private scalar.
    ///
    /// The caller takes on the zeroization obligation for the returned
    /// array.
    pub fn private_bytes(&self) -> [u8; 32] {
        self.private
    }
}

/// Clamps a 32-byte scalar per RFC 7748 §5: clear the low 3 bits of byte 0,
/// clear the top bit and set bit 6 of byte 31.
fn clamp_scalar(scalar: &mut [u8; 32]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}

/// Derives an X25519 shared secret from our private key and a peer's public
/// key.
///
/// Rejects an all-zero peer public key with [`Error::InvalidPeerKey`] —
/// accepting it would let a malicious peer drive the shared secret to a
/// known low-order point (contributory behavior).
pub fn derive_shared_secret(private: &[u8; 32], peer_public: &[u8; 32]) -> Result<[u8; 32]> {
    if is_zero_key(peer_public) {
        return Err(Error::InvalidPeerKey);
    }
    let mut our_private = *private;
    let mut their_public = *peer_public;
    let shared = x25519_dalek::x25519(our_private, their_public);
    our_private.zeroize();
    their_public.zeroize();
    Ok(shared)
}

/// Constant-time all-zero check for a 32-byte key.
fn is_zero_key(key: &[u8; 32]) -> bool {
    let mut acc = 0u8;
    for b in key {
        acc |= b;
    }
    acc == 0
}
