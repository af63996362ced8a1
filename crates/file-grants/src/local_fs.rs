//! The local (Unix) file system collaborator.
//!
//! Identity is the `(st_dev, st_ino)` pair. An editor that saves by writing
//! a new file and renaming it over the old one produces a new inode, which
//! this collaborator reports as the original file being gone.

use std::fs::{self, File, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use file_grants_core::{
    Blake3Hash, FileIdentity, FileLocation, FileSignature, FileSystem, FsError, IdentifiedFile,
    Resolution,
};

/// [`FileSystem`] over the host's local disks.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    hash_contents: bool,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include a Blake3 digest of the content in every signature.
    pub fn with_content_hashing(mut self, enabled: bool) -> Self {
        self.hash_contents = enabled;
        self
    }

    fn signature(&self, path: &Path, meta: &Metadata) -> Result<FileSignature, FsError> {
        let modified_ns = meta
            .mtime()
            .saturating_mul(1_000_000_000)
            .saturating_add(meta.mtime_nsec());
        let signature = FileSignature::from_metadata(modified_ns, meta.len());

        if !self.hash_contents {
            return Ok(signature);
        }

        let mut hasher = blake3::Hasher::new();
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut hasher)?;
        Ok(FileSignature {
            digest: Some(Blake3Hash::from(hasher.finalize())),
            ..signature
        })
    }
}

fn identity_of(meta: &Metadata) -> FileIdentity {
    FileIdentity::new(meta.dev(), meta.ino())
}

fn not_found_as(err: io::Error, path: &Path) -> FsError {
    if err.kind() == io::ErrorKind::NotFound {
        FsError::NotFound(path.to_path_buf())
    } else {
        FsError::Io(err)
    }
}

impl FileSystem for LocalFileSystem {
    fn identify(&self, path: &Path) -> Result<IdentifiedFile, FsError> {
        let canonical = fs::canonicalize(path).map_err(|e| not_found_as(e, path))?;
        let meta = fs::metadata(&canonical).map_err(|e| not_found_as(e, path))?;
        if !meta.is_file() {
            return Err(FsError::NotAFile(canonical));
        }

        let name = canonical
            .file_name()
            .ok_or_else(|| FsError::NotAFile(canonical.clone()))?;
        if name.to_str().is_none() {
            return Err(FsError::Unsupported(format!(
                "file name is not valid UTF-8: {}",
                canonical.display()
            )));
        }
        let location = FileLocation::from_path(&canonical)
            .ok_or_else(|| FsError::NotAFile(canonical.clone()))?;

        Ok(IdentifiedFile {
            identity: identity_of(&meta),
            signature: self.signature(&canonical, &meta)?,
            location,
        })
    }

    fn resolve(
        &self,
        identity: &FileIdentity,
        location: &FileLocation,
    ) -> Result<Resolution, FsError> {
        let cached = location.path();
        match fs::metadata(&cached) {
            Ok(meta) if meta.is_file() && identity_of(&meta) == *identity => {
                return Ok(Resolution::Found {
                    location: location.clone(),
                    signature: self.signature(&cached, &meta)?,
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::Io(e)),
        }

        // Not at the cached path: look for a rename within the directory.
        let entries = match fs::read_dir(&location.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Resolution::Gone),
            Err(e) => return Err(FsError::Io(e)),
        };

        for entry in entries {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(FsError::Io(e)),
            };
            if !meta.is_file() || identity_of(&meta) != *identity {
                continue;
            }

            // Renamed to a name a location cannot hold.
            let Ok(name) = entry.file_name().into_string() else {
                return Ok(Resolution::Gone);
            };
            let found = FileLocation::new(location.directory.clone(), name);
            let signature = self.signature(&found.path(), &meta)?;
            return Ok(Resolution::Found {
                location: found,
                signature,
            });
        }

        Ok(Resolution::Gone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identified(fs: &LocalFileSystem, path: &Path) -> IdentifiedFile {
        fs.identify(path).unwrap()
    }

    #[test]
    fn test_identify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let file = identified(&LocalFileSystem::new(), &path);
        assert_eq!(file.location.display_name(), "a.txt");
        assert_eq!(file.signature.len, 5);
        assert!(file.signature.digest.is_none());
    }

    #[test]
    fn test_identify_rejects_directories_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fs_ = LocalFileSystem::new();

        assert!(matches!(fs_.identify(dir.path()), Err(FsError::NotAFile(_))));
        assert!(matches!(
            fs_.identify(&dir.path().join("missing")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_content_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let file = identified(&LocalFileSystem::new().with_content_hashing(true), &path);
        assert_eq!(file.signature.digest, Some(Blake3Hash::hash(b"hello")));
    }

    #[test]
    fn test_resolve_after_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let local = LocalFileSystem::new();
        let file = identified(&local, &path);
        fs::write(&path, b"hello, world").unwrap();

        match local.resolve(&file.identity, &file.location).unwrap() {
            Resolution::Found {
                location,
                signature,
            } => {
                assert_eq!(location, file.location);
                assert_eq!(signature.len, 12);
                assert_ne!(signature, file.signature);
            }
            Resolution::Gone => panic!("file should resolve"),
        }
    }

    #[test]
    fn test_resolve_rename_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let local = LocalFileSystem::new();
        let file = identified(&local, &path);
        fs::rename(&path, dir.path().join("b.txt")).unwrap();

        match local.resolve(&file.identity, &file.location).unwrap() {
            Resolution::Found { location, .. } => {
                assert_eq!(location.display_name(), "b.txt");
                assert!(location.is_rename_of(&file.location));
            }
            Resolution::Gone => panic!("renamed file should resolve"),
        }
    }

    #[test]
    fn test_resolve_moved_or_deleted_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let moved = dir.path().join("moved.txt");
        let deleted = dir.path().join("deleted.txt");
        fs::write(&moved, b"m").unwrap();
        fs::write(&deleted, b"d").unwrap();

        let local = LocalFileSystem::new();
        let m = identified(&local, &moved);
        let d = identified(&local, &deleted);

        fs::rename(&moved, sub.join("moved.txt")).unwrap();
        fs::remove_file(&deleted).unwrap();

        assert_eq!(
            local.resolve(&m.identity, &m.location).unwrap(),
            Resolution::Gone
        );
        assert_eq!(
            local.resolve(&d.identity, &d.location).unwrap(),
            Resolution::Gone
        );
    }

    #[cfg(target_os = "linux")]
    mod non_utf8 {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        use super::*;

        #[test]
        fn test_identify_rejects_non_utf8_name() {
            let dir = tempfile::tempdir().unwrap();
            let granted = dir.path().join(OsStr::from_bytes(b"caf\xE9.txt"));
            let bystander = dir.path().join("caf\u{FFFD}.txt");
            fs::write(&granted, b"granted").unwrap();
            fs::write(&bystander, b"bystander").unwrap();

            let local = LocalFileSystem::new();
            assert!(matches!(
                local.identify(&granted),
                Err(FsError::Unsupported(_))
            ));
            assert_eq!(
                identified(&local, &bystander).location.display_name(),
                "caf\u{FFFD}.txt"
            );
            assert_eq!(fs::read(&bystander).unwrap(), b"bystander");
        }

        #[test]
        fn test_rename_to_non_utf8_name_is_gone() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("a.txt");
            fs::write(&path, b"hello").unwrap();

            let local = LocalFileSystem::new();
            let file = identified(&local, &path);
            fs::rename(&path, dir.path().join(OsStr::from_bytes(b"caf\xE9.txt"))).unwrap();
            fs::write(dir.path().join("caf\u{FFFD}.txt"), b"bystander").unwrap();

            assert_eq!(
                local.resolve(&file.identity, &file.location).unwrap(),
                Resolution::Gone
            );
        }
    }
}
