//! Ed25519 signatures.
//!
//! The "private key" the rest of the crate deals with is a 32-byte seed;
//! `ed25519_dalek::SigningKey` expands that seed into the full signing key
//! internally.

use ed25519_dalek::ed25519::signature::Signer as _;
use ed25519_dalek::{Signature as DalekSignature, SigningKey, Verifier as _, VerifyingKey};

use crate::error::{Error, Result};

/// Size of an Ed25519 signature, in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// A 64-byte Ed25519 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

/// Signs `message` with the Ed25519 key derived from `seed`.
///
/// Ed25519 signing is deterministic: the same `(seed, message)` pair always
/// produces the same signature. Empty messages are rejected —
/// distinguishing "no message" from "signed empty string" is the caller's
/// job, not this function's.
pub fn sign(seed: &[u8; 32], message: &[u8]) -> Result<Signature> {
    if message.is_empty() {
        return Err(Error::EmptyMessage);
    }
    let signing_key = SigningKey::from_bytes(seed);
    let sig: DalekSignature = signing_key.sign(message);
    Ok(Signature(sig.to_bytes()))
}

/// Verifies a signature produced by [`sign`] against the Ed25519 public key
/// derived from the same seed.
///
/// Returns `Ok(())` on success; any failure (wrong key, tampered message,
/// tampered signature) is reported as [`Error::AuthFailed`] without
/// distinguishing the cause.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> Result<()> {
    if message.is_empty() {
        return Err(Error::EmptyMessage);
    }
    let verifying_key = VerifyingKey::from_bytes(public_key).map_err(|_| Error::InvalidPeerKey)?;
    let sig = DalekSignature::from_bytes(&signature.0);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| Error::AuthFailed)
}

/// Derives the Ed25519 public key for a given 32-byte signing seed.
pub fn public_key_from_seed(seed: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn sign_verify_round_trip() {
        let seed = seed(7);
        let public = public_key_from_seed(&seed);
        let message = b"hello from alice";

        let sig = sign(&seed, message).unwrap();
        assert!(verify(&public, message, &sig).is_ok());
    }

    #[test]
    fn flipping_a_message_bit_fails_verification() {
        let seed = seed(7);
        let public = public_key_from_seed(&seed);
        let mut message = b"hello from alice".to_vec();

        let sig = sign(&seed, &message).unwrap();
        message[0] ^= 0x01;
        assert!(matches!(verify(&public, &message, &sig), Err(Error::AuthFailed)));
    }

    #[test]
    fn flipping_a_signature_bit_fails_verification() {
        let seed = seed(7);
        let public = public_key_from_seed(&seed);
        let message = b"hello from alice";

        let mut sig = sign(&seed, message).unwrap();
        sig.0[0] ^= 0x01;
        assert!(matches!(verify(&public, message, &sig), Err(Error::AuthFailed)));
    }

    #[test]
    fn empty_message_rejected() {
        let seed = seed(1);
        assert!(matches!(sign(&seed, b""), Err(Error::EmptyMessage)));
    }

    #[test]
    fn signing_is_deterministic() {
        let seed = seed(42);
        let message = b"some message";
        let sig1 = sign(&seed, message).unwrap();
        let sig2 = sign(&seed, message).unwrap();
        assert_eq!(sig1, sig2);
    }
}
