//! # noisevault-core
//!
//! The cryptographic core of a peer-to-peer messaging stack modeled after
//! the Tox protocol: primitive authenticated encryption and signatures,
//! a two-message Noise-IK handshake with bidirectional rekeying sessions,
//! long-term identity key lifecycle, and persistent replay protection.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                        NOISEVAULT-CORE MODULES                        │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │                                                                       │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────────────────┐  │
//! │  │  Identity   │   │  Key Store   │   │    Noise-IK Handshake     │  │
//! │  │             │   │              │   │                           │  │
//! │  │ - ToxId     │   │ - PBKDF2 KDF │   │ - IkInitiator/IkResponder │  │
//! │  │ - Rotation  │◄──┤ - AES-256GCM │   │ - NoiseSession + rekey    │  │
//! │  └──────┬──────┘   └──────────────┘   └─────────────┬─────────────┘  │
//! │         │                                           │                │
//! │  ┌──────┴──────┐   ┌──────────────┐   ┌─────────────┴─────────────┐  │
//! │  │   Crypto    │   │ Nonce Store  │   │  Session Manager / Rekey  │  │
//! │  │             │   │              │   │  Scheduler / Ephemeral    │  │
//! │  │ - X25519    │   │ - Replay set │   │  Key Manager              │  │
//! │  │ - crypto_box│   │ - Persistent │   └────────────────────────────┘  │
//! │  │ - Ed25519   │   └──────────────┘                                  │
//! │  └─────────────┘                       ┌────────────────────────────┐│
//! │                                         │ Capabilities Negotiation   ││
//! │                                         └────────────────────────────┘│
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] — the crate-wide error taxonomy and numeric error codes
//! - [`time`] — the injectable clock every time-dependent subsystem consults
//! - [`convert`] — checked `u64`/`i64` conversions for on-disk timestamp fields
//! - [`secure_mem`] — constant-time buffer wiping
//! - [`crypto`] — Curve25519/Ed25519 primitives, `crypto_box`/`secretbox` AEAD
//! - [`identity`] — the ToxID wire identity and key rotation lifecycle
//! - [`keystore`] — the encrypted, file-backed identity key store
//! - [`nonce_store`] — persistent replay protection for handshake nonces
//! - [`noise`] — the two-message Noise-IK handshake and its session cipher
//! - [`capabilities`] — protocol version and cipher-suite negotiation
//! - [`session_manager`] — the session registry, rekey scheduler, and ephemeral-key cache
//! - [`config`] — [`config::CoreConfig`], gathering every knob above into one constructable value
//!
//! ## Scope
//!
//! Deliberately out of scope (treated as external collaborators): transport
//! and UDP I/O, DHT routing, friend-graph management, file transfer,
//! audio/video, higher-level messaging framing, a CLI, and a C-ABI binding
//! layer. This crate exposes the contracts those collaborators consume — it
//! does not implement them.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod capabilities;
pub mod config;
pub mod convert;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod keystore;
pub mod noise;
pub mod nonce_store;
pub mod secure_mem;
pub mod session_manager;
/// Injectable clock used by every time-dependent subsystem.
pub mod time;

pub use capabilities::{CipherSuite, NegotiatedProtocol, ProtocolCapabilities, ProtocolVersion};
pub use config::CoreConfig;
pub use crypto::KeyPair;
pub use error::{Error, Result};
pub use identity::{KeyRotationManager, ToxId};
pub use keystore::EncryptedKeyStore;
pub use noise::{CipherChoice, IkInitiator, IkResponder, NoiseSession};
pub use nonce_store::{NonceCleanupTask, NonceStore};
pub use session_manager::{EphemeralKeyManager, RekeyScheduler, SessionManager};

/// Returns this crate's version, as set in `Cargo.toml`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build information for debugging and diagnostics.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version.
    pub version: &'static str,
    /// Target triple's OS component.
    pub target: &'static str,
    /// Build profile (`"debug"` or `"release"`).
    pub profile: &'static str,
}

/// Returns build information for debugging.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        #[cfg(target_os = "macos")]
        target: "macos",
        #[cfg(target_os = "linux")]
        target: "linux",
        #[cfg(target_os = "windows")]
        target: "windows",
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        target: "unknown",
        profile: if cfg!(debug_assertions) { "debug" } else { "release" },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
    }
}
