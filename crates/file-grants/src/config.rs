//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use file_grants_core::DirtyPolicy;

use crate::error::{GrantsError, Result};

/// Configuration for [`FileGrants`](crate::FileGrants).
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```
/// use file_grants::GrantsConfig;
/// use file_grants::core::DirtyPolicy;
///
/// let config = GrantsConfig::from_json(r#"{ "dirty_policy": "never_dirty" }"#).unwrap();
/// assert_eq!(config.dirty_policy, DirtyPolicy::NeverDirty);
/// assert_eq!(config.list_page_size, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantsConfig {
    /// How external modifications are surfaced.
    pub dirty_policy: DirtyPolicy,

    /// Include a Blake3 content digest in file signatures.
    pub hash_contents: bool,

    /// How long revoked or invalid grants are kept to explain denials.
    pub revoked_retention_ms: i64,

    /// Page size used when listing an origin's grants.
    pub list_page_size: usize,
}

impl Default for GrantsConfig {
    fn default() -> Self {
        Self {
            dirty_policy: DirtyPolicy::default(),
            hash_contents: false,
            revoked_retention_ms: 24 * 60 * 60 * 1000,
            list_page_size: 64,
        }
    }
}

impl GrantsConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| GrantsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| GrantsError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.list_page_size == 0 {
            return Err(GrantsError::Config("list_page_size must be positive".into()));
        }
        if self.revoked_retention_ms < 0 {
            return Err(GrantsError::Config(
                "revoked_retention_ms must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn with_dirty_policy(mut self, policy: DirtyPolicy) -> Self {
        self.dirty_policy = policy;
        self
    }
}
