//! FileGrants: unified API for the grant system.
//!
//! Brings together the store, the file system collaborator, the access
//! validator and the revocation manager behind one interface for the
//! browser side of the file picker.

use std::path::Path;
use std::sync::Arc;

use file_grants_core::{now_millis, AccessMode, FileSystem, GrantKey, NewGrant, Origin};
use file_grants_store::{GrantStore, SqliteGrantStore};

use crate::config::GrantsConfig;
use crate::dirty::DirtyTracker;
use crate::error::{GrantsError, Result};
use crate::listing::GrantListing;
use crate::revocation::RevocationManager;
use crate::validator::{AccessTicket, AccessValidator, Decision};

/// The main FileGrants struct.
///
/// Provides a unified API for:
/// - Creating grants from files the user picked
/// - Validating reads and writes
/// - Listing an origin's grants
/// - Revocation, purge and garbage collection
pub struct FileGrants<S: GrantStore, F: FileSystem> {
    /// The storage backend.
    store: Arc<S>,
    /// File system collaborator.
    fs: Arc<F>,
    /// Configuration.
    config: GrantsConfig,
    validator: AccessValidator<S, F>,
    revocation: RevocationManager<S>,
}

impl<F: FileSystem + 'static> FileGrants<SqliteGrantStore, F> {
    /// Open (or create) a grant database and load its grants.
    pub fn open(db_path: impl AsRef<Path>, fs: F, config: GrantsConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        let store = SqliteGrantStore::open(db_path)?;
        tracing::info!(path = %db_path.display(), "grant database opened");
        Self::new(store, fs, config)
    }
}

#[cfg(unix)]
impl FileGrants<SqliteGrantStore, crate::local_fs::LocalFileSystem> {
    /// Open a grant database backed by the local file system.
    pub fn open_local(db_path: impl AsRef<Path>, config: GrantsConfig) -> Result<Self> {
        let fs = crate::local_fs::LocalFileSystem::new().with_content_hashing(config.hash_contents);
        Self::open(db_path, fs, config)
    }
}

impl<S: GrantStore, F: FileSystem + 'static> FileGrants<S, F> {
    /// Create a new instance over an already opened store.
    pub fn new(store: S, fs: F, config: GrantsConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(store);
        let fs = Arc::new(fs);
        let validator = AccessValidator::new(
            Arc::clone(&store),
            Arc::clone(&fs),
            DirtyTracker::new(config.dirty_policy),
        );
        let revocation = RevocationManager::new(Arc::clone(&store));

        Ok(Self {
            store,
            fs,
            config,
            validator,
            revocation,
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn config(&self) -> &GrantsConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a grant for a file the user picked.
    ///
    /// Fails with [`GrantsError::IdentityUnavailable`] when the file cannot
    /// be identified; no grant is created in that case.
    pub async fn create_grant(
        &self,
        origin: &Origin,
        path: impl AsRef<Path>,
        mode: AccessMode,
    ) -> Result<GrantKey> {
        let path = path.as_ref().to_path_buf();
        let fs = Arc::clone(&self.fs);
        let picked = path.clone();
        let file = tokio::task::spawn_blocking(move || fs.identify(&picked))
            .await?
            .map_err(|source| GrantsError::IdentityUnavailable { path, source })?;

        let new = NewGrant {
            origin: origin.clone(),
            identity: file.identity,
            location: file.location,
            signature: file.signature,
            mode,
        };
        let key = self.store.create(new, now_millis()).await?;

        tracing::info!(%origin, ?key, ?mode, "grant created");
        Ok(key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a read.
    pub async fn validate_read(
        &self,
        origin: &Origin,
        key: &GrantKey,
        accept_stale: bool,
    ) -> Result<Decision> {
        self.validator.validate_read(origin, key, accept_stale).await
    }

    /// Validate a write.
    pub async fn validate_write(
        &self,
        origin: &Origin,
        key: &GrantKey,
        force: bool,
    ) -> Result<Decision> {
        self.validator.validate_write(origin, key, force).await
    }

    /// Record the outcome of a write authorized by `ticket`.
    pub async fn finish_write(&self, ticket: AccessTicket) -> Result<bool> {
        self.validator.finish_write(ticket).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// Lazily list `origin`'s grants.
    pub fn list_grants(&self, origin: &Origin) -> GrantListing<S> {
        GrantListing::new(
            Arc::clone(&self.store),
            origin.clone(),
            self.config.list_page_size,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Revoke one of `origin`'s grants.
    ///
    /// Returns `false` if `origin` holds no such grant.
    pub async fn revoke(&self, origin: &Origin, key: &GrantKey) -> Result<bool> {
        self.revocation
            .revoke_by_user(origin, key, now_millis())
            .await
    }

    /// The file behind `key` was reported moved or deleted by something
    /// other than an access check.
    ///
    /// Returns whether the grant was invalidated by this call.
    pub async fn notify_moved(&self, key: &GrantKey) -> Result<bool> {
        self.revocation.revoke_on_move(key, now_millis()).await
    }

    /// Destroy every grant of `origin` (site storage cleared).
    pub async fn purge(&self, origin: &Origin) -> Result<usize> {
        self.revocation.purge_on_storage_clear(origin).await
    }

    /// Drop a revoked or invalid grant the origin has acknowledged.
    pub async fn confirm_revocation(&self, origin: &Origin, key: &GrantKey) -> Result<bool> {
        self.revocation.confirm_revocation(origin, key).await
    }

    /// Destroy terminal grants older than the configured retention.
    pub async fn collect_garbage(&self) -> Result<usize> {
        self.revocation
            .collect_expired(now_millis(), self.config.revoked_retention_ms)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Flush the store and shut down.
    pub async fn close(self) -> Result<()> {
        self.store.flush().await?;
        tracing::info!("grant store closed");
        Ok(())
    }
}
