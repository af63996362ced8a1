//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;
use std::sync::Arc;

use file_grants::{FileGrants, GrantsConfig};
use file_grants_core::{AccessMode, GrantKey, Origin};
use file_grants_store::MemoryGrantStore;

use crate::memory_fs::MemoryFileSystem;

/// Engine type used by [`TestGrants`].
pub type MemoryGrants = FileGrants<MemoryGrantStore, Arc<MemoryFileSystem>>;

/// A grant engine over an in-memory store and file system.
///
/// The file system handle is shared with the engine, so tests can edit,
/// rename and delete files between validations.
pub struct TestGrants {
    pub fs: Arc<MemoryFileSystem>,
    pub grants: MemoryGrants,
}

impl TestGrants {
    /// Default configuration.
    pub fn new() -> Self {
        Self::with_config(GrantsConfig::default())
    }

    pub fn with_config(config: GrantsConfig) -> Self {
        let fs = Arc::new(MemoryFileSystem::new().with_content_hashing(config.hash_contents));
        let grants = FileGrants::new(MemoryGrantStore::new(), Arc::clone(&fs), config)
            .expect("test configuration is valid");
        Self { fs, grants }
    }

    /// Create a file and grant `origin` access to it.
    pub async fn grant_file(
        &self,
        origin: &Origin,
        path: impl AsRef<Path>,
        content: &[u8],
        mode: AccessMode,
    ) -> GrantKey {
        let path = path.as_ref();
        self.fs.create(path, content);
        self.grants
            .create_grant(origin, path, mode)
            .await
            .expect("grant creation failed")
    }
}

impl Default for TestGrants {
    fn default() -> Self {
        Self::new()
    }
}

/// A well-formed origin for `host`.
pub fn origin(host: &str) -> Origin {
    Origin::new(format!("https://{}", host)).expect("valid origin")
}

/// Distinct origins for multi-site tests.
pub fn origins(count: usize) -> Vec<Origin> {
    (0..count)
        .map(|i| origin(&format!("site-{}.example", i)))
        .collect()
}
