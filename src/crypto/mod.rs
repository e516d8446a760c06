//! # Cryptographic Primitives
//!
//! Curve25519/Ed25519 key pairs, NaCl-compatible `crypto_box`/`secretbox`
//! AEAD, and Ed25519 signing. This is the leaf layer everything else in the
//! crate builds on.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      PRIMITIVES LAYER                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                       │
//! │  KeyPair (X25519, RFC 7748 clamped)                                  │
//! │    │                                                                 │
//! │    ├─► derive_shared_secret(priv, peer_pub) ─► 32-byte shared secret │
//! │    │                                                                 │
//! │    ├─► boxes::encrypt/decrypt  (crypto_box: X25519 + XSalsa20Poly1305)│
//! │    │                                                                 │
//! │    └─► boxes::encrypt_symmetric/decrypt_symmetric (secretbox)        │
//! │                                                                       │
//! │  Ed25519 seed ─► signing::sign/verify ─► 64-byte Signature           │
//! │                                                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod boxes;
pub mod keys;
pub mod signing;

pub use boxes::MAX_ENCRYPTION_BUFFER;
pub use keys::KeyPair;
pub use signing::{sign, verify, Signature, SIGNATURE_SIZE};

/// Size of a Curve25519 public or private key, in bytes.
pub const KEY_SIZE: usize = 32;
