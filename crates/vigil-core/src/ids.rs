//! Sequence numbers and digest identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// A sequence number in either the log or a group's sigchain.
///
/// Both sequences start at 1 and only grow.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Seqno(pub u64);

impl Seqno {
    /// How far `self` is ahead of `earlier`, or 0 if it is not ahead.
    #[must_use]
    pub const fn saturating_distance_from(self, earlier: Seqno) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The following sequence number, if it does not overflow.
    #[must_use]
    pub const fn checked_next(self) -> Option<Seqno> {
        match self.0.checked_add(1) {
            Some(n) => Some(Seqno(n)),
            None => None,
        }
    }
}

impl fmt::Display for Seqno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Seqno {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// Defines a 32-byte digest newtype serialized as lowercase hex.
macro_rules! digest_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Encode as hex string.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Decode from hex string.
            ///
            /// # Errors
            ///
            /// Returns [`CoreError::InvalidDigest`] if the string is not
            /// valid hex or does not decode to 32 bytes.
            pub fn from_hex(s: &str) -> CoreResult<Self> {
                let bytes = hex::decode(s).map_err(|e| CoreError::InvalidDigest(e.to_string()))?;
                let bytes: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
                    CoreError::InvalidDigest(format!("expected 32 bytes, got {}", b.len()))
                })?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }
    };
}

digest_type!(
    /// Hash reference to one link of a group's sigchain.
    LinkId
);

digest_type!(
    /// Opaque root hash of a log snapshot.
    RootHash
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seqno_distance() {
        assert_eq!(Seqno(1500).saturating_distance_from(Seqno(400)), 1100);
        assert_eq!(Seqno(3).saturating_distance_from(Seqno(9)), 0);
    }

    #[test]
    fn test_seqno_next() {
        assert_eq!(Seqno(1).checked_next(), Some(Seqno(2)));
        assert_eq!(Seqno(u64::MAX).checked_next(), None);
    }

    #[test]
    fn test_digest_hex() {
        let link = LinkId::from_bytes([0xab; 32]);
        assert_eq!(LinkId::from_hex(&link.to_hex()).unwrap(), link);
        assert!(LinkId::from_hex("abcd").is_err());
        assert!(RootHash::from_hex("not hex").is_err());
    }

    #[test]
    fn test_seqno_as_map_key() {
        let mut probes = std::collections::BTreeMap::new();
        probes.insert(Seqno(12), 0usize);
        probes.insert(Seqno(40), 1usize);
        let json = serde_json::to_string(&probes).unwrap();
        assert_eq!(json, r#"{"12":0,"40":1}"#);
        let back: std::collections::BTreeMap<Seqno, usize> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, probes);
    }
}
