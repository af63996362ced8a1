//! A scriptable in-memory file system.
//!
//! Tests drive it the way a user or another program would drive a real
//! disk: create, edit, rename, move and delete files between grant
//! operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use file_grants_core::{
    FileIdentity, FileLocation, FileSignature, FileSystem, FsError, IdentifiedFile, Resolution,
};

/// Volume number reported for every file.
pub const VOLUME: u64 = 1;

#[derive(Debug, Clone)]
struct Entry {
    object: u64,
    content: Vec<u8>,
    modified_ns: i64,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, Entry>,
    next_object: u64,
    clock_ns: i64,
}

impl Inner {
    /// Every mutation gets a strictly later mtime.
    fn tick(&mut self) -> i64 {
        self.clock_ns += 1_000;
        self.clock_ns
    }
}

/// In-memory [`FileSystem`] with a logical mtime clock.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    inner: Mutex<Inner>,
    hash_contents: bool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include content digests in signatures.
    pub fn with_content_hashing(mut self, enabled: bool) -> Self {
        self.hash_contents = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signature(&self, entry: &Entry) -> FileSignature {
        let signature = FileSignature::from_metadata(entry.modified_ns, entry.content.len() as u64);
        if self.hash_contents {
            signature.with_content(&entry.content)
        } else {
            signature
        }
    }

    /// Create a file with a fresh identity, replacing whatever was at `path`.
    pub fn create(&self, path: impl AsRef<Path>, content: &[u8]) -> FileIdentity {
        let mut inner = self.lock();
        inner.next_object += 1;
        let object = inner.next_object;
        let modified_ns = inner.tick();
        inner.files.insert(
            path.as_ref().to_path_buf(),
            Entry {
                object,
                content: content.to_vec(),
                modified_ns,
            },
        );
        FileIdentity::new(VOLUME, object)
    }

    /// Overwrite a file in place, keeping its identity.
    pub fn write(&self, path: impl AsRef<Path>, content: &[u8]) -> Result<(), FsError> {
        let path = path.as_ref();
        let mut inner = self.lock();
        let modified_ns = inner.tick();
        let entry = inner
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        entry.content = content.to_vec();
        entry.modified_ns = modified_ns;
        Ok(())
    }

    /// Bump the modification time without changing content.
    pub fn touch(&self, path: impl AsRef<Path>) -> Result<(), FsError> {
        let path = path.as_ref();
        let mut inner = self.lock();
        let modified_ns = inner.tick();
        let entry = inner
            .files
            .get_mut(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        entry.modified_ns = modified_ns;
        Ok(())
    }

    /// Rename or move a file, keeping its identity and metadata.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), FsError> {
        let from = from.as_ref();
        let mut inner = self.lock();
        let entry = inner
            .files
            .remove(from)
            .ok_or_else(|| FsError::NotFound(from.to_path_buf()))?;
        inner.files.insert(to.as_ref().to_path_buf(), entry);
        Ok(())
    }

    /// Delete a file.
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<(), FsError> {
        let path = path.as_ref();
        self.lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    /// Current content of a file.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(path.as_ref())
            .map(|e| e.content.clone())
    }

    /// Current signature of a file.
    pub fn signature_of(&self, path: impl AsRef<Path>) -> Option<FileSignature> {
        let inner = self.lock();
        inner.files.get(path.as_ref()).map(|e| self.signature(e))
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.contains_key(path.as_ref())
    }
}

impl FileSystem for MemoryFileSystem {
    fn identify(&self, path: &Path) -> Result<IdentifiedFile, FsError> {
        let inner = self.lock();
        let entry = inner
            .files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
        let location =
            FileLocation::from_path(path).ok_or_else(|| FsError::NotAFile(path.to_path_buf()))?;

        Ok(IdentifiedFile {
            identity: FileIdentity::new(VOLUME, entry.object),
            location,
            signature: self.signature(entry),
        })
    }

    fn resolve(
        &self,
        identity: &FileIdentity,
        location: &FileLocation,
    ) -> Result<Resolution, FsError> {
        if identity.volume != VOLUME {
            return Ok(Resolution::Gone);
        }

        let inner = self.lock();
        let cached = location.path();
        if let Some(entry) = inner.files.get(&cached) {
            if entry.object == identity.object {
                return Ok(Resolution::Found {
                    location: location.clone(),
                    signature: self.signature(entry),
                });
            }
        }

        let renamed = inner.files.iter().find(|(path, entry)| {
            entry.object == identity.object && path.parent() == Some(location.directory.as_path())
        });

        Ok(match renamed.and_then(|(path, entry)| Some((FileLocation::from_path(path)?, entry))) {
            Some((found, entry)) => Resolution::Found {
                location: found,
                signature: self.signature(entry),
            },
            None => Resolution::Gone,
        })
    }
}
