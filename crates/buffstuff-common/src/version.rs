//! Version types for snapshot compatibility.

use serde::{Deserialize, Serialize};

/// Schema version of a persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// First snapshot layout: records without a tick counter.
    pub const SNAPSHOT_V1: Self = Self::new(1, 0);

    /// Current snapshot layout: records carry a tick counter.
    pub const SNAPSHOT_V2: Self = Self::new(1, 1);

    /// Version written by this build.
    pub const SNAPSHOT_CURRENT: Self = Self::SNAPSHOT_V2;

    /// Checks if this version can read data written at `data_version`.
    /// Readable means same major version and this minor >= data minor.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major && self.minor >= data_version.minor
    }

    /// Encodes as four little-endian bytes (major, minor).
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 4] {
        let major = self.major.to_le_bytes();
        let minor = self.minor.to_le_bytes();
        [major[0], major[1], minor[0], minor[1]]
    }

    /// Decodes from four little-endian bytes.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self {
            major: u16::from_le_bytes([bytes[0], bytes[1]]),
            minor: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Magic bytes for blob format identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicBytes(pub [u8; 4]);

impl MagicBytes {
    /// Buff snapshot magic bytes.
    pub const SNAPSHOT: Self = Self(*b"BFST");

    /// Returns true if `bytes` starts with these magic bytes.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 4 && bytes[..4] == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_byte_encoding() {
        let v = SchemaVersion::new(3, 258);
        assert_eq!(SchemaVersion::from_le_bytes(v.to_le_bytes()), v);
    }

    #[test]
    fn test_current_reads_legacy() {
        assert!(SchemaVersion::SNAPSHOT_CURRENT.can_read(&SchemaVersion::SNAPSHOT_V1));
        assert!(!SchemaVersion::SNAPSHOT_V1.can_read(&SchemaVersion::SNAPSHOT_V2));
    }

    #[test]
    fn test_magic_matches() {
        assert!(MagicBytes::SNAPSHOT.matches(b"BFST...."));
        assert!(!MagicBytes::SNAPSHOT.matches(b"BF"));
        assert!(!MagicBytes::SNAPSHOT.matches(b"GNSV...."));
    }
}
