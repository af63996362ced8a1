//! Capability keys and origins.
//!
//! A [`GrantKey`] is the only thing a site ever holds. It is 32 bytes of
//! randomness with no relation to the file path or content, so knowing one
//! key says nothing about any other key or file.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{CoreError, Result};

/// A 32-byte opaque capability token.
///
/// `Display` renders the full hex string handed to the site. `Debug` prints
/// only a prefix so keys can appear in logs without leaking the capability.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantKey(pub [u8; 32]);

impl GrantKey {
    /// Width of a key in bytes.
    pub const LEN: usize = 32;

    /// Generate a fresh random key from the thread RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidKey("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Constant-time equality, for comparisons against caller-supplied keys.
    pub fn ct_matches(&self, other: &GrantKey) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantKey({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for GrantKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for GrantKey {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// The site origin that owns a grant, e.g. `https://editor.example`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin(String);

impl Origin {
    /// Maximum accepted origin length in bytes.
    pub const MAX_LEN: usize = 2048;

    /// Create an origin, rejecting empty, oversized, or control-character input.
    pub fn new(origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        if origin.is_empty() {
            return Err(CoreError::InvalidOrigin("empty origin".into()));
        }
        if origin.len() > Self::MAX_LEN {
            return Err(CoreError::InvalidOrigin(format!(
                "origin exceeds {} bytes",
                Self::MAX_LEN
            )));
        }
        if origin.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(CoreError::InvalidOrigin(origin));
        }
        Ok(Self(origin))
    }

    /// The origin string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two origins without an early exit on the first differing byte.
    pub fn ct_matches(&self, other: &Origin) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Origin {
    type Error = CoreError;

    fn try_from(origin: String) -> Result<Self> {
        Self::new(origin)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.0
    }
}

impl std::str::FromStr for Origin {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
