//! The change set handed to consumers on every reload.
//!
//! A [`ChangeSet`] is what a configuration consumer receives each time the
//! watched file changes: the raw bytes plus enough metadata to decide how to
//! decode them and whether anything actually changed.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::checksum::{checksum, verify_checksum};

/// Source name stamped on change sets read from a file.
pub const FILE_SOURCE: &str = "file";

/// A snapshot of a configuration source's contents.
///
/// The data is carried verbatim; nothing in this crate parses it. The
/// `format` field tells the consumer which decoder to use.
///
/// # Examples
///
/// ```
/// use cw_core::ChangeSet;
/// use std::time::SystemTime;
///
/// let set = ChangeSet::new(b"a: 1".to_vec(), "yaml", "file", SystemTime::now());
/// assert_eq!(set.as_bytes(), b"a: 1");
/// assert_eq!(set.format, "yaml");
/// assert!(set.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Raw contents of the source.
    pub data: Vec<u8>,

    /// Lowercase hex BLAKE3 digest of `data`.
    pub checksum: String,

    /// Encoding of `data`, usually the file extension (`yaml`, `json`, ...).
    pub format: String,

    /// Name of the source that produced this change set.
    pub source: String,

    /// Modification time of the source when it was read.
    pub timestamp: SystemTime,
}

impl ChangeSet {
    /// Creates a change set, computing the checksum of `data`.
    #[must_use]
    pub fn new(
        data: Vec<u8>,
        format: impl Into<String>,
        source: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        let checksum = checksum(&data);
        Self {
            data,
            checksum,
            format: format.into(),
            source: source.into(),
            timestamp,
        }
    }

    /// Returns the raw contents.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the change set and returns the raw contents.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns the number of bytes in the change set.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the source was empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the stored checksum matches the data.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        verify_checksum(&self.data, &self.checksum)
    }

    /// Returns `true` if `other` carries the same contents.
    ///
    /// Only checksums are compared; format, source and timestamp are ignored.
    #[inline]
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.checksum == other.checksum
    }
}
