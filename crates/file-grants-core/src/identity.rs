//! File identity, location, and content signatures.
//!
//! Identity answers "is this still the same file object". Location answers
//! "where did we last see it". Signature answers "has its content changed".
//! The three are deliberately independent: a rename changes only the
//! location, an external edit changes only the signature.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A 32-byte Blake3 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl From<blake3::Hash> for Blake3Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Opaque token for the underlying file object.
///
/// On Unix this is the `(device, inode)` pair. Two identities are equal iff
/// they name the same on-disk object, regardless of its current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Volume or device the object lives on.
    pub volume: u64,
    /// Object number within the volume.
    pub object: u64,
}

impl FileIdentity {
    pub const fn new(volume: u64, object: u64) -> Self {
        Self { volume, object }
    }
}

/// Last known location of a granted file.
///
/// Cached on the grant so the file system collaborator can resolve the
/// identity cheaply, and so the settings surface has a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    /// Directory containing the file.
    pub directory: PathBuf,
    /// File name within `directory`.
    pub name: String,
}

impl FileLocation {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
        }
    }

    /// Split a full path into directory and file name.
    ///
    /// Returns `None` for paths without a final component (e.g. `/` or `..`)
    /// and for file names that are not valid UTF-8.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_owned();
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Some(Self { directory, name })
    }

    /// Full path of the file.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// Name shown to the user in the settings surface.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// Whether `other` is the same directory with a different file name.
    pub fn is_rename_of(&self, other: &FileLocation) -> bool {
        self.directory == other.directory && self.name != other.name
    }
}

/// Content fingerprint captured at access time.
///
/// Metadata alone (mtime + length) is cheap and catches ordinary edits. The
/// optional digest catches same-size edits within the mtime resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSignature {
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: i64,
    /// File length in bytes.
    pub len: u64,
    /// Blake3 digest of the content, when content hashing is enabled.
    pub digest: Option<Blake3Hash>,
}

impl FileSignature {
    /// Signature from metadata only.
    pub const fn from_metadata(modified_ns: i64, len: u64) -> Self {
        Self {
            modified_ns,
            len,
            digest: None,
        }
    }

    /// Attach a content digest.
    pub fn with_content(mut self, content: &[u8]) -> Self {
        self.digest = Some(Blake3Hash::hash(content));
        self
    }
}
