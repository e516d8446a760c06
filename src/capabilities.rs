//! Protocol version and cipher-suite negotiation.
//!
//! Exchanged out-of-band (outside the scope of this crate) as JSON before a
//! handshake starts, so both peers can agree on a protocol version and
//! cipher suite without guessing.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A semantic `major.minor.patch` version, each component a `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major component. Incompatible changes bump this.
    pub major: u8,
    /// Minor component.
    pub minor: u8,
    /// Patch component.
    pub patch: u8,
}

impl ProtocolVersion {
    /// Builds a version from its three components.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }

    /// Whether `self` is compatible with `other`: same major, and `self >= other`.
    pub fn is_compatible_with(&self, other: &ProtocolVersion) -> bool {
        self.major == other.major && self >= other
    }
}

/// The cipher suites a peer supports for the Noise handshake, in preference order.
pub const KNOWN_NOISE_CIPHERS: [&str; 2] = [
    "Noise_IK_25519_ChaChaPoly_SHA256",
    "Noise_IK_25519_AESGCM_SHA256",
];

/// A capabilities record advertised by one peer to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolCapabilities {
    /// Lowest protocol version this peer accepts.
    pub min_version: ProtocolVersion,
    /// Highest protocol version this peer accepts.
    pub max_version: ProtocolVersion,
    /// Cipher-suite wire names this peer supports, in preference order.
    pub supported_ciphers: Vec<String>,
    /// Whether this peer can run the Noise-IK handshake.
    pub noise_supported: bool,
    /// Whether this peer can fall back to the legacy (pre-Noise) handshake.
    pub legacy_supported: bool,
    /// Free-form extension identifiers, for forward compatibility.
    pub extensions: Vec<String>,
}

/// The outcome of negotiating two [`ProtocolCapabilities`] records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedProtocol {
    /// The highest mutually-supported protocol version.
    pub version: ProtocolVersion,
    /// The selected cipher: either a Noise wire name or `"legacy"`.
    pub cipher: String,
}

/// Selects the best mutually-supported (version, cipher) pair.
///
/// 1. Intersects `[min_version, max_version]` ranges component-wise; empty
///    intersection fails with [`Error::NoCompatibleVersion`].
/// 2. Picks the highest version in the intersection.
/// 3. If that version's major ≥ 2 and both sides advertise Noise, picks the
///    first cipher from [`KNOWN_NOISE_CIPHERS`] present in both suite lists.
/// 4. Otherwise, if both sides advertise legacy, selects `"legacy"`.
/// 5. Otherwise fails with [`Error::NoCompatibleCipher`].
pub fn select_best_protocol(local: &ProtocolCapabilities, remote: &ProtocolCapabilities) -> Result<NegotiatedProtocol> {
    let lower = local.min_version.max(remote.min_version);
    let upper = local.max_version.min(remote.max_version);
    if lower > upper {
        return Err(Error::NoCompatibleVersion);
    }
    let version = upper;

    if version.major >= 2 && local.noise_supported && remote.noise_supported {
        for candidate in KNOWN_NOISE_CIPHERS {
            if local.supported_ciphers.iter().any(|c| c == candidate)
                && remote.supported_ciphers.iter().any(|c| c == candidate)
            {
                return Ok(NegotiatedProtocol {
                    version,
                    cipher: candidate.to_string(),
                });
            }
        }
    }

    if local.legacy_supported && remote.legacy_supported {
        return Ok(NegotiatedProtocol {
            version,
            cipher: "legacy".to_string(),
        });
    }

    Err(Error::NoCompatibleCipher)
}

/// A parsed `Noise_IK_<DH>_<CIPHER>_<HASH>` cipher-suite name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuite {
    /// Diffie-Hellman algorithm, e.g. `"25519"`.
    pub dh: &'static str,
    /// AEAD cipher, e.g. `"ChaChaPoly"`.
    pub cipher: &'static str,
    /// Hash function, e.g. `"SHA256"`.
    pub hash: &'static str,
}

const SUPPORTED_DH: [&str; 1] = ["25519"];
const SUPPORTED_CIPHERS: [&str; 2] = ["ChaChaPoly", "AESGCM"];
const SUPPORTED_HASH: [&str; 1] = ["SHA256"];

impl CipherSuite {
    /// Parses a wire name of the exact form `Noise_IK_<DH>_<CIPHER>_<HASH>`.
    ///
    /// P256/P521/SHA512/BLAKE2s are reserved for future use and rejected by
    /// the current build even though they parse structurally.
    pub fn parse(name: &str) -> Result<Self> {
        let mut parts = name.split('_');
        match (parts.next(), parts.next()) {
            (Some("Noise"), Some("IK")) => {}
            _ => return Err(Error::UnsupportedDH(name.to_string())),
        }

        let dh = parts.next().ok_or_else(|| Error::UnsupportedDH(name.to_string()))?;
        let cipher = parts
            .next()
            .ok_or_else(|| Error::UnsupportedCipher(name.to_string()))?;
        let hash = parts.next().ok_or_else(|| Error::UnsupportedHash(name.to_string()))?;
        if parts.next().is_some() {
            return Err(Error::UnsupportedHash(name.to_string()));
        }

        let dh = SUPPORTED_DH
            .iter()
            .find(|&&d| d == dh)
            .copied()
            .ok_or_else(|| Error::UnsupportedDH(dh.to_string()))?;
        let cipher = SUPPORTED_CIPHERS
            .iter()
            .find(|&&c| c == cipher)
            .copied()
            .ok_or_else(|| Error::UnsupportedCipher(cipher.to_string()))?;
        let hash = SUPPORTED_HASH
            .iter()
            .find(|&&h| h == hash)
            .copied()
            .ok_or_else(|| Error::UnsupportedHash(hash.to_string()))?;

        Ok(Self { dh, cipher, hash })
    }

    /// Renders back to the canonical wire name.
    pub fn wire_name(&self) -> String {
        format!("Noise_IK_{}_{}_{}", self.dh, self.cipher, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        min: (u8, u8, u8),
        max: (u8, u8, u8),
        ciphers: &[&str],
        noise: bool,
        legacy: bool,
    ) -> ProtocolCapabilities {
        ProtocolCapabilities {
            min_version: ProtocolVersion::new(min.0, min.1, min.2),
            max_version: ProtocolVersion::new(max.0, max.1, max.2),
            supported_ciphers: ciphers.iter().map(|s| s.to_string()).collect(),
            noise_supported: noise,
            legacy_supported: legacy,
            extensions: Vec::new(),
        }
    }

    #[test]
    fn legacy_only_remote_falls_back_to_legacy() {
        let local = caps(
            (1, 0, 0),
            (2, 0, 0),
            &["Noise_IK_25519_ChaChaPoly_SHA256"],
            true,
            true,
        );
        let remote = caps((1, 0, 0), (1, 0, 0), &[], false, true);

        let result = select_best_protocol(&local, &remote).unwrap();
        assert_eq!(result.version, ProtocolVersion::new(1, 0, 0));
        assert_eq!(result.cipher, "legacy");
    }

    #[test]
    fn both_on_v2_noise_selects_chachapoly() {
        let local = caps(
            (2, 0, 0),
            (2, 0, 0),
            &["Noise_IK_25519_ChaChaPoly_SHA256"],
            true,
            false,
        );
        let remote = caps(
            (2, 0, 0),
            (2, 0, 0),
            &["Noise_IK_25519_ChaChaPoly_SHA256", "Noise_IK_25519_AESGCM_SHA256"],
            true,
            false,
        );

        let result = select_best_protocol(&local, &remote).unwrap();
        assert_eq!(result.version, ProtocolVersion::new(2, 0, 0));
        assert_eq!(result.cipher, "Noise_IK_25519_ChaChaPoly_SHA256");
    }

    #[test]
    fn disjoint_version_ranges_fail() {
        let local = caps((1, 0, 0), (1, 5, 0), &[], false, true);
        let remote = caps((2, 0, 0), (2, 5, 0), &[], false, true);
        assert!(matches!(
            select_best_protocol(&local, &remote),
            Err(Error::NoCompatibleVersion)
        ));
    }

    #[test]
    fn no_shared_cipher_or_legacy_fails() {
        let local = caps((2, 0, 0), (2, 0, 0), &["Noise_IK_25519_ChaChaPoly_SHA256"], true, false);
        let remote = caps((2, 0, 0), (2, 0, 0), &["Noise_IK_25519_AESGCM_SHA256"], true, false);
        assert!(matches!(
            select_best_protocol(&local, &remote),
            Err(Error::NoCompatibleCipher)
        ));
    }

    #[test]
    fn cipher_suite_round_trips_through_wire_name() {
        let suite = CipherSuite::parse("Noise_IK_25519_ChaChaPoly_SHA256").unwrap();
        assert_eq!(suite.wire_name(), "Noise_IK_25519_ChaChaPoly_SHA256");
    }

    #[test]
    fn cipher_suite_rejects_unsupported_hash() {
        let result = CipherSuite::parse("Noise_IK_25519_ChaChaPoly_BLAKE2s");
        assert!(matches!(result, Err(Error::UnsupportedHash(_))));
    }

    #[test]
    fn cipher_suite_rejects_unsupported_dh() {
        let result = CipherSuite::parse("Noise_IK_P256_ChaChaPoly_SHA256");
        assert!(matches!(result, Err(Error::UnsupportedDH(_))));
    }

    #[test]
    fn capabilities_serialize_to_expected_json_shape() {
        let local = caps((1, 0, 0), (2, 0, 0), &["Noise_IK_25519_ChaChaPoly_SHA256"], true, true);
        let json = serde_json::to_value(&local).unwrap();
        assert_eq!(json["min_version"]["major"], 1);
        assert_eq!(json["noise_supported"], true);
    }
}
