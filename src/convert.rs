//! Checked `u64 <-> i64` conversions for on-disk timestamp fields.
//!
//! On-disk formats (the nonce store, the key-store container) store
//! timestamps as `u64` or `i64` depending on context; this module is the
//! single place that bridges between them so a malformed or adversarial
//! file can't silently wrap a timestamp into the past or future.

use crate::error::{Error, Result};

/// Converts a `u64` to `i64`, failing if the value doesn't fit.
pub fn u64_to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| Error::Overflow)
}

/// Converts an `i64` to `u64`, failing if the value is negative.
pub fn i64_to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Overflow)
}
