//! Content checksums for change sets.
//!
//! Every [`ChangeSet`](crate::ChangeSet) is stamped with a BLAKE3 digest of its
//! bytes so consumers can cheaply tell whether a reload actually changed
//! anything. The digest is rendered as 64 lowercase hex characters.
//!
//! # Examples
//!
//! ```
//! use cw_core::{checksum, verify_checksum};
//!
//! let sum = checksum(b"a: 1");
//! assert_eq!(sum.len(), 64);
//! assert!(verify_checksum(b"a: 1", &sum));
//! assert!(!verify_checksum(b"a: 2", &sum));
//! ```

/// Length of a hex-encoded checksum.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Computes the lowercase hex BLAKE3 digest of `data`.
#[inline]
#[must_use]
pub fn checksum(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Returns `true` if `expected` is the checksum of `data`.
///
/// Comparison is case-insensitive so digests produced by other tools
/// (which may use uppercase hex) still match.
#[must_use]
pub fn verify_checksum(data: &[u8], expected: &str) -> bool {
    expected.len() == CHECKSUM_HEX_LEN && checksum(data).eq_ignore_ascii_case(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_hex() {
        let sum = checksum(b"hello");
        assert_eq!(sum.len(), CHECKSUM_HEX_LEN);
        assert!(sum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(checksum(b"a: 1"), checksum(b"a: 1"));
        assert_ne!(checksum(b"a: 1"), checksum(b"a: 2"));
    }

    #[test]
    fn test_checksum_of_empty_input() {
        // Well-known BLAKE3 digest of the empty string
        assert_eq!(
            checksum(b""),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_verify_checksum_case_insensitive() {
        let sum = checksum(b"config").to_ascii_uppercase();
        assert!(verify_checksum(b"config", &sum));
    }

    #[test]
    fn test_verify_checksum_rejects_wrong_length() {
        assert!(!verify_checksum(b"config", "abc"));
    }
}
