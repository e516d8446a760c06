//! Constant-time buffer wiping.
//!
//! `zeroize` already gives us this for types that derive it; these free
//! functions exist for the cases the spec calls out explicitly — wiping a
//! borrowed buffer the caller still owns, and wiping only the private half
//! of a key pair.

use zeroize::Zeroize;

use crate::crypto::keys::KeyPair;
use crate::error::{Error, Result};

/// Zeroes every byte of `buf` in a way the compiler cannot optimize away.
///
/// Fails with [`Error::NilBuffer`] if `buf` is empty — an empty buffer is
/// almost always a caller bug (a key or nonce that was never populated),
/// not a legitimate wipe-nothing request.
pub fn secure_wipe(buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Err(Error::NilBuffer);
    }
    buf.zeroize();
    Ok(())
}

/// Like [`secure_wipe`] but discards the error — safe to call on a
/// possibly-empty buffer when the caller has nothing useful to do with a
/// failure.
pub fn zero_bytes(buf: &mut [u8]) {
    let _ = secure_wipe(buf);
}

/// Wipes only the private half of a key pair, leaving the public key intact.
pub fn wipe_key_pair(pair: &mut KeyPair) {
    pair.private.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_wipe_zeroes_buffer() {
        let mut buf = [1u8, 2, 3, 4, 5];
        secure_wipe(&mut buf).unwrap();
        assert_eq!(buf, [0u8; 5]);
    }

    #[test]
    fn secure_wipe_nil_fails() {
        let mut buf: [u8; 0] = [];
        assert!(matches!(secure_wipe(&mut buf), Err(Error::NilBuffer)));
    }

    #[test]
    fn zero_bytes_is_nil_safe() {
        let mut buf: [u8; 0] = [];
        zero_bytes(&mut buf); // must not panic
    }

    #[test]
    fn wipe_key_pair_clears_only_private_half() {
        let mut pair = KeyPair::generate().unwrap();
        let public_before = pair.public;
        wipe_key_pair(&mut pair);
        assert_eq!(pair.private, [0u8; 32]);
        assert_eq!(pair.public, public_before);
    }
}
