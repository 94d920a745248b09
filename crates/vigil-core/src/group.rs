//! Group identifiers.
//!
//! A [`GroupId`] is 16 bytes rendered as 32 lowercase hex characters. The
//! final byte tags the kind of group, and in particular its visibility:
//!
//! | Suffix | Kind |
//! |--------|------|
//! | `0x24` | private root group |
//! | `0x25` | private subgroup |
//! | `0x2e` | public root group |
//! | `0x2f` | public subgroup |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

const GROUP_ID_BYTES: usize = 16;
const SUFFIX_PRIVATE: u8 = 0x24;
const SUFFIX_PRIVATE_SUB: u8 = 0x25;
const SUFFIX_PUBLIC: u8 = 0x2e;
const SUFFIX_PUBLIC_SUB: u8 = 0x2f;

/// Identifier of an audited group.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId {
    hex: String,
    suffix: u8,
}

impl GroupId {
    /// Parse a group id from its hex form.
    ///
    /// Upper-case input is accepted and normalized to lower case.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidGroupId`] if the input is not 32 hex
    /// characters or carries an unknown type suffix.
    pub fn parse(value: &str) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidGroupId {
            value: value.to_owned(),
            reason: reason.to_owned(),
        };

        let bytes = hex::decode(value).map_err(|e| invalid(&e.to_string()))?;
        let Some(&suffix) = bytes.last() else {
            return Err(invalid("empty id"));
        };
        if bytes.len() != GROUP_ID_BYTES {
            return Err(invalid(&format!(
                "expected {GROUP_ID_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        if !matches!(
            suffix,
            SUFFIX_PRIVATE | SUFFIX_PRIVATE_SUB | SUFFIX_PUBLIC | SUFFIX_PUBLIC_SUB
        ) {
            return Err(invalid(&format!("unknown type suffix {suffix:#04x}")));
        }

        Ok(Self {
            hex: hex::encode(bytes),
            suffix,
        })
    }

    /// Build a group id from 15 bytes of entropy plus the type suffix
    /// implied by `public` and `subgroup`.
    #[must_use]
    pub fn from_parts(body: [u8; 15], public: bool, subgroup: bool) -> Self {
        let suffix = match (public, subgroup) {
            (false, false) => SUFFIX_PRIVATE,
            (false, true) => SUFFIX_PRIVATE_SUB,
            (true, false) => SUFFIX_PUBLIC,
            (true, true) => SUFFIX_PUBLIC_SUB,
        };
        let mut bytes = [0u8; GROUP_ID_BYTES];
        bytes[..15].copy_from_slice(&body);
        bytes[15] = suffix;
        Self {
            hex: hex::encode(bytes),
            suffix,
        }
    }

    /// Whether the group is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self.suffix, SUFFIX_PUBLIC | SUFFIX_PUBLIC_SUB)
    }

    /// Whether the group is a subgroup of another group.
    #[must_use]
    pub fn is_subgroup(&self) -> bool {
        matches!(self.suffix, SUFFIX_PRIVATE_SUB | SUFFIX_PUBLIC_SUB)
    }

    /// The canonical hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.hex)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl FromStr for GroupId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GroupId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.hex
    }
}

impl AsRef<str> for GroupId {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}
