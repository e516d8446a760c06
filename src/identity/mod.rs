//! # Identity
//!
//! Long-term identity is a Curve25519 key pair bound to a [`tox_id::ToxId`]
//! (the wire-shareable public identifier) and managed over time by a
//! [`rotation::KeyRotationManager`].
//!
//! ```text
//! KeyPair ──► ToxId::new(public_key, nospam) ──► 76-char hex (shareable)
//!    │
//!    └─► KeyRotationManager ──► rotate()/emergency_rotate() ──► new current key
//! ```

pub mod rotation;
pub mod tox_id;

pub use rotation::KeyRotationManager;
pub use tox_id::ToxId;
