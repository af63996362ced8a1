//! The file system boundary.
//!
//! The grant engine never reads file bytes. It only asks the host file
//! system two questions: "what is this file" at creation time, and "where is
//! this identity now, and what does it look like" at access time.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::identity::{FileIdentity, FileLocation, FileSignature};

/// Errors from the file system collaborator.
#[derive(Debug, Error)]
pub enum FsError {
    /// Nothing exists at the path.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The platform cannot produce a stable identity.
    #[error("file identity unsupported: {0}")]
    Unsupported(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the engine learns about a file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedFile {
    pub identity: FileIdentity,
    pub location: FileLocation,
    pub signature: FileSignature,
}

/// Where an identity resolves now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The identity resolves to a file at `location` (which may differ from
    /// the cached location) with the given current signature.
    Found {
        location: FileLocation,
        signature: FileSignature,
    },
    /// The identity no longer resolves to any file the collaborator can see.
    Gone,
}

/// Host file system collaborator.
///
/// Implementations must be cheap: both methods run inside a grant's atomic
/// section.
pub trait FileSystem: Send + Sync {
    /// Identify the file at `path` for a new grant.
    fn identify(&self, path: &Path) -> Result<IdentifiedFile, FsError>;

    /// Resolve `identity`, starting from its last known `location`.
    fn resolve(
        &self,
        identity: &FileIdentity,
        location: &FileLocation,
    ) -> Result<Resolution, FsError>;
}

impl<F: FileSystem + ?Sized> FileSystem for std::sync::Arc<F> {
    fn identify(&self, path: &Path) -> Result<IdentifiedFile, FsError> {
        (**self).identify(path)
    }

    fn resolve(
        &self,
        identity: &FileIdentity,
        location: &FileLocation,
    ) -> Result<Resolution, FsError> {
        (**self).resolve(identity, location)
    }
}
