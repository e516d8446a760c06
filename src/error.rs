//! # Error Handling
//!
//! A single error taxonomy for the whole crate, grouped into numeric code
//! ranges by kind so a caller embedding this crate behind its own boundary
//! (FFI, RPC, structured logs) can match on an integer instead of a string.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Error                                                               │
//! │  ├── Input        (100-199) — caller supplied something malformed   │
//! │  ├── Crypto        (200-299) — authentication/handshake failures    │
//! │  ├── Negotiation   (300-399) — no compatible version/cipher         │
//! │  ├── Persistence   (400-499) — filesystem / on-disk format          │
//! │  ├── Numeric       (500-599) — checked integer conversions          │
//! │  └── Concurrency   (600-699) — operation on a closed store/manager  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
///
/// Decryption/authentication failures are intentionally collapsed into a
/// single opaque variant (`AuthFailed`) rather than distinguishing "wrong
/// key" from "tampered ciphertext" — giving a caller that distinction would
/// open an oracle an attacker could use to probe key material.
#[derive(Error, Debug)]
pub enum Error {
    // ------------------------------------------------------------------
    // Input (100-199)
    // ------------------------------------------------------------------
    /// An encryption/signing input was empty where a non-empty value is required.
    #[error("message must not be empty")]
    EmptyMessage,

    /// Input exceeded `MaxEncryptionBuffer`.
    #[error("message of {0} bytes exceeds the maximum encryption buffer size")]
    MessageTooLarge(usize),

    /// A secret key failed validation (wrong length, or zero where non-zero is required).
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// A peer public key failed validation (wrong length, or all-zero).
    #[error("invalid peer public key")]
    InvalidPeerKey,

    /// Ciphertext shorter than the minimum possible (nonce + tag).
    #[error("ciphertext length {0} is shorter than the minimum valid length")]
    InvalidCiphertextLength(usize),

    /// A parsed ToxID's checksum does not match the recomputed checksum.
    #[error("ToxID checksum mismatch")]
    InvalidChecksum,

    /// Hex decoding failed or produced the wrong length.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    /// A key-store password was empty.
    #[error("password must not be empty")]
    EmptyPassword,

    /// A rotation period below the 24h minimum was requested.
    #[error("rotation period must be at least 24 hours")]
    PeriodTooShort,

    /// `secure_wipe` was called with no buffer.
    #[error("secure_wipe called with a nil buffer")]
    NilBuffer,

    // ------------------------------------------------------------------
    // Crypto (200-299)
    // ------------------------------------------------------------------
    /// AEAD or box decryption/authentication failed.
    #[error("authentication failed")]
    AuthFailed,

    /// A Noise handshake message failed authentication.
    #[error("handshake authentication failed")]
    HandshakeAuth,

    /// A read/write was attempted on a handshake that has already completed.
    #[error("handshake has already completed")]
    HandshakeComplete,

    /// Key-store decryption failed: either the password is wrong or the file is corrupt.
    #[error("wrong password or corrupt key store file")]
    WrongPasswordOrCorrupt,

    // ------------------------------------------------------------------
    // Negotiation (300-399)
    // ------------------------------------------------------------------
    /// No overlapping protocol version range between local and remote capabilities.
    #[error("no compatible protocol version")]
    NoCompatibleVersion,

    /// No overlapping cipher suite between local and remote capabilities.
    #[error("no compatible cipher suite")]
    NoCompatibleCipher,

    /// A cipher-suite name referenced an unsupported DH algorithm.
    #[error("unsupported DH algorithm: {0}")]
    UnsupportedDH(String),

    /// A cipher-suite name referenced an unsupported AEAD cipher.
    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    /// A cipher-suite name referenced an unsupported hash function.
    #[error("unsupported hash: {0}")]
    UnsupportedHash(String),

    // ------------------------------------------------------------------
    // Persistence (400-499)
    // ------------------------------------------------------------------
    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An on-disk file was too short or otherwise structurally invalid.
    #[error("corrupt store: {0}")]
    CorruptStore(String),

    /// The on-disk container's version field does not match the version this build reads.
    #[error("version mismatch: file is version {found}, expected {expected}")]
    VersionMismatch {
        /// Version byte read from the container.
        found: u16,
        /// Version byte this build expects.
        expected: u16,
    },

    /// A password-rotation operation failed partway through and was rolled back.
    #[error("password rotation failed and was rolled back: {0}")]
    RotationFailed(String),

    /// The TOML config file could not be read or parsed.
    #[error("config file {0} could not be read or parsed: {1}")]
    ConfigFile(String, String),

    // ------------------------------------------------------------------
    // Numeric (500-599)
    // ------------------------------------------------------------------
    /// A `u64 <-> i64` conversion would lose information or produce a negative/overflowing value.
    #[error("integer conversion overflow")]
    Overflow,

    // ------------------------------------------------------------------
    // Concurrency (600-699)
    // ------------------------------------------------------------------
    /// The store/manager has been closed and no longer accepts operations.
    #[error("operation attempted on a stopped store or manager")]
    Stopped,
}

impl Error {
    /// A stable numeric code for this error, grouped by kind.
    ///
    /// Callers embedding this crate behind their own boundary (FFI, RPC,
    /// structured logs) can match on this instead of the error's `Display`
    /// text, which is not guaranteed stable across versions.
    pub fn code(&self) -> u32 {
        match self {
            Error::EmptyMessage => 100,
            Error::MessageTooLarge(_) => 101,
            Error::InvalidSecretKey => 102,
            Error::InvalidPeerKey => 103,
            Error::InvalidCiphertextLength(_) => 104,
            Error::InvalidChecksum => 105,
            Error::InvalidHex(_) => 106,
            Error::EmptyPassword => 107,
            Error::PeriodTooShort => 108,
            Error::NilBuffer => 109,

            Error::AuthFailed => 200,
            Error::HandshakeAuth => 201,
            Error::HandshakeComplete => 202,
            Error::WrongPasswordOrCorrupt => 203,

            Error::NoCompatibleVersion => 300,
            Error::NoCompatibleCipher => 301,
            Error::UnsupportedDH(_) => 302,
            Error::UnsupportedCipher(_) => 303,
            Error::UnsupportedHash(_) => 304,

            Error::Io(_) => 400,
            Error::CorruptStore(_) => 401,
            Error::VersionMismatch { .. } => 402,
            Error::RotationFailed(_) => 403,
            Error::ConfigFile(_, _) => 404,

            Error::Overflow => 500,

            Error::Stopped => 600,
        }
    }

    /// Whether a caller could plausibly retry or route around this error
    /// (persistence/negotiation kinds) as opposed to it indicating either
    /// an attack or a programming error (crypto/numeric kinds).
    pub fn is_recoverable(&self) -> bool {
        matches!(self.code(), 300..=499)
    }
}
