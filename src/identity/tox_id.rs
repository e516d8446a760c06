//! ToxID: public key + anti-spam tag + checksum, the wire identity format.
//!
//! ```text
//! ┌──────────────────────┬───────────────┬─────────────┐
//! │ public key (32 bytes) │ nospam (4 B)  │ checksum (2B)│
//! └──────────────────────┴───────────────┴─────────────┘
//! ```
//! Serialized as 76 lowercase hex characters. The checksum is an XOR-fold of
//! the first 36 bytes into two bytes (byte `i` XORed into `checksum[i % 2]`),
//! not a cryptographic MAC — it catches transcription typos, nothing more.

use crate::error::{Error, Result};

/// Length of the serialized ToxID, in hex characters.
pub const TOX_ID_HEX_LEN: usize = 76;

/// A ToxID: a public key bound to an anti-spam tag and a transcription
/// checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToxId {
    public_key: [u8; 32],
    nospam: [u8; 4],
    checksum: [u8; 2],
}

impl ToxId {
    /// Builds a ToxID from a public key and anti-spam tag, computing the
    /// checksum.
    pub fn new(public_key: [u8; 32], nospam: [u8; 4]) -> Self {
        let checksum = compute_checksum(&public_key, &nospam);
        Self {
            public_key,
            nospam,
            checksum,
        }
    }

    /// Draws a fresh 4-byte anti-spam tag from the OS CSPRNG and builds a
    /// ToxID from it.
    pub fn generate(public_key: [u8; 32]) -> Result<Self> {
        use rand_core::RngCore;
        let mut nospam = [0u8; 4];
        rand_core::OsRng.fill_bytes(&mut nospam);
        Ok(Self::new(public_key, nospam))
    }

    /// The wrapped public key.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// The anti-spam tag.
    pub fn nospam(&self) -> &[u8; 4] {
        &self.nospam
    }

    /// The transcription checksum.
    pub fn checksum(&self) -> &[u8; 2] {
        &self.checksum
    }

    /// Replaces the anti-spam tag and recomputes the checksum.
    pub fn set_nospam(&mut self, nospam: [u8; 4]) {
        self.nospam = nospam;
        self.checksum = compute_checksum(&self.public_key, &self.nospam);
    }

    /// Serializes to the canonical 76-char lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(38);
        bytes.extend_from_slice(&self.public_key);
        bytes.extend_from_slice(&self.nospam);
        bytes.extend_from_slice(&self.checksum);
        hex::encode(bytes)
    }

    /// Parses a 76-char hex ToxID, validating length, hex well-formedness,
    /// and checksum match. Accepts uppercase hex on input; output from
    /// [`ToxId::to_hex`] is always lowercase.
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != TOX_ID_HEX_LEN {
            return Err(Error::InvalidHex(format!(
                "ToxID must be {} hex characters, got {}",
                TOX_ID_HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| Error::InvalidHex(e.to_string()))?;
        debug_assert_eq!(bytes.len(), 38);

        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(&bytes[0..32]);
        let mut nospam = [0u8; 4];
        nospam.copy_from_slice(&bytes[32..36]);
        let mut checksum = [0u8; 2];
        checksum.copy_from_slice(&bytes[36..38]);

        let expected = compute_checksum(&public_key, &nospam);
        if checksum != expected {
            return Err(Error::InvalidChecksum);
        }

        Ok(Self {
            public_key,
            nospam,
            checksum,
        })
    }
}

fn compute_checksum(public_key: &[u8; 32], nospam: &[u8; 4]) -> [u8; 2] {
    let mut checksum = [0u8; 2];
    for (i, &byte) in public_key.iter().chain(nospam.iter()).enumerate() {
        checksum[i % 2] ^= byte;
    }
    checksum
}

impl std::fmt::Display for ToxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ToxId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk() -> [u8; 32] {
        let mut key = [1u8; 32];
        key[0] = 0x01;
        key
    }

    #[test]
    fn round_trips_through_hex() {
        let id = ToxId::new(pk(), [0xDE, 0xAD, 0xBE, 0xEF]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), TOX_ID_HEX_LEN);

        let parsed = ToxId::parse(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_accepts_uppercase_but_emits_lowercase() {
        let id = ToxId::new(pk(), [0xDE, 0xAD, 0xBE, 0xEF]);
        let upper = id.to_hex().to_uppercase();

        let parsed = ToxId::parse(&upper).unwrap();
        assert_eq!(parsed.to_hex(), id.to_hex());
        assert_eq!(parsed.to_hex(), parsed.to_hex().to_lowercase());
    }

    #[test]
    fn flipping_checksum_nibble_is_rejected() {
        let id = ToxId::new(pk(), [0xDE, 0xAD, 0xBE, 0xEF]);
        let mut hex = id.to_hex();
        let last = hex.len() - 1;
        let flipped = match hex.as_bytes()[last] {
            b'0' => '1',
            _ => '0',
        };
        hex.replace_range(last.., &flipped.to_string());

        assert!(matches!(ToxId::parse(&hex), Err(Error::InvalidChecksum)));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(ToxId::parse("abcd"), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn non_hex_characters_are_rejected() {
        let bad = "z".repeat(TOX_ID_HEX_LEN);
        assert!(matches!(ToxId::parse(&bad), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn set_nospam_recomputes_checksum() {
        let mut id = ToxId::new(pk(), [0, 0, 0, 0]);
        let original_checksum = *id.checksum();

        id.set_nospam([1, 2, 3, 4]);
        assert_ne!(*id.checksum(), original_checksum);

        let hex = id.to_hex();
        assert!(ToxId::parse(&hex).is_ok());
    }
}
