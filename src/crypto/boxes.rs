//! NaCl-compatible `crypto_box` (public-key) and `secretbox` (symmetric) AEAD.
//!
//! Both schemes use XSalsa20-Poly1305 under the hood; `crypto_box` additionally
//! runs X25519 + HSalsa20 to turn a Diffie-Hellman shared point into the
//! symmetric key. Ciphertexts are always exactly 16 bytes longer than their
//! plaintext (the Poly1305 tag); there is no separate MAC to check.

use crypto_box::aead::{Aead, OsRng as BoxOsRng};
use crypto_box::{PublicKey, SecretKey};
use crypto_secretbox::aead::OsRng as SecretBoxOsRng;
use crypto_secretbox::{KeyInit, XSalsa20Poly1305};
use rand_core::RngCore;

use crate::error::{Error, Result};

/// Largest plaintext this module will encrypt, in bytes. Rejecting oversized
/// input before any allocation keeps a misbehaving caller from forcing a
/// multi-gigabyte buffer into memory.
pub const MAX_ENCRYPTION_BUFFER: usize = 1024 * 1024;

/// Nonce for a public-key box: 24 random bytes, unique per encryption under
/// a given key pair.
pub type BoxNonce = [u8; 24];

/// Nonce for a symmetric secretbox: 24 random bytes, unique per encryption
/// under a given key.
pub type SecretNonce = [u8; 24];

fn check_plaintext_len(message: &[u8]) -> Result<()> {
    if message.is_empty() {
        return Err(Error::EmptyMessage);
    }
    if message.len() > MAX_ENCRYPTION_BUFFER {
        return Err(Error::MessageTooLarge(message.len()));
    }
    Ok(())
}

/// Generates a fresh random nonce for either box flavor.
pub fn generate_nonce() -> [u8; 24] {
    let mut nonce = [0u8; 24];
    BoxOsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `message` for `peer_public` using our `private` key.
///
/// The shared `crypto_box::Box` (X25519 + HSalsa20 + XSalsa20-Poly1305) is
/// recomputed on every call — this module has no notion of a cached box,
/// that belongs to the session layer.
pub fn encrypt(private: &[u8; 32], peer_public: &[u8; 32], message: &[u8]) -> Result<(BoxNonce, Vec<u8>)> {
    check_plaintext_len(message)?;

    let our_secret = SecretKey::from(*private);
    let their_public = PublicKey::from(*peer_public);
    let b = crypto_box::Box::new(&their_public, &our_secret);

    let nonce = generate_nonce();
    let ciphertext = b
        .encrypt((&nonce).into(), message)
        .map_err(|_| Error::AuthFailed)?;
    Ok((nonce, ciphertext))
}

/// Decrypts a ciphertext produced by [`encrypt`].
///
/// Fails atomically with [`Error::AuthFailed`] on any authentication
/// failure — tampered ciphertext, wrong nonce, wrong key — without
/// distinguishing the cause.
pub fn decrypt(
    private: &[u8; 32],
    peer_public: &[u8; 32],
    nonce: &BoxNonce,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() {
        return Err(Error::InvalidCiphertextLength(ciphertext.len()));
    }

    let our_secret = SecretKey::from(*private);
    let their_public = PublicKey::from(*peer_public);
    let b = crypto_box::Box::new(&their_public, &our_secret);

    b.decrypt(nonce.into(), ciphertext)
        .map_err(|_| Error::AuthFailed)
}

/// Encrypts `message` under a 32-byte symmetric key (XSalsa20-Poly1305).
pub fn encrypt_symmetric(key: &[u8; 32], message: &[u8]) -> Result<(SecretNonce, Vec<u8>)> {
    check_plaintext_len(message)?;

    let cipher = XSalsa20Poly1305::new(key.into());
    let mut nonce = [0u8; 24];
    SecretBoxOsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt((&nonce).into(), message)
        .map_err(|_| Error::AuthFailed)?;
    Ok((nonce, ciphertext))
}

/// Decrypts a ciphertext produced by [`encrypt_symmetric`].
pub fn decrypt_symmetric(key: &[u8; 32], nonce: &SecretNonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() {
        return Err(Error::InvalidCiphertextLength(ciphertext.len()));
    }

    let cipher = XSalsa20Poly1305::new(key.into());
    cipher
        .decrypt(nonce.into(), ciphertext)
        .map_err(|_| Error::AuthFailed)
}
