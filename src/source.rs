//! Source handles and local-access resolution.
//!
//! The engine needs a path on a local, readable filesystem before it can
//! hand anything to exiftool. Hosts store files in more places than that:
//! object storage, encrypted volumes, network mounts. [`SourceFile`] is the
//! caller-side handle; [`resolve_local`] turns it into a usable path,
//! materializing a full temporary copy when the storage backend cannot
//! provide one directly.
//!
//! Ownership rule: a path aliasing the source's own storage is *not*
//! registered for cleanup (deleting it would delete the user's file); a
//! materialized copy is registered before any bytes are written, so even a
//! half-finished copy is cleaned up.

use crate::tempfiles::{TempFileSet, unique_path};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A source file as the host sees it. The engine only reads it.
pub trait SourceFile {
    /// Path on plain local storage, when one exists. `None` for remote or
    /// encrypted sources, which must be copied down first.
    fn local_path(&self) -> Option<&Path>;

    /// Open the file's content for streaming.
    fn open(&self) -> io::Result<Box<dyn Read>>;

    /// File extension hint, used for availability checks and temp naming.
    fn extension(&self) -> Option<&str> {
        self.local_path()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
    }
}

/// A plain file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceFile for LocalFile {
    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn open(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// Produce a locally readable path for the source.
///
/// Local sources pass their own path through untouched. Everything else is
/// streamed in full into a fresh temp file registered in `tmp`. If the copy
/// fails midway the partial file is deleted before the error propagates, so
/// no failure path leaves bytes behind.
pub fn resolve_local(source: &dyn SourceFile, tmp: &mut TempFileSet) -> io::Result<PathBuf> {
    if let Some(path) = source.local_path() {
        return Ok(path.to_path_buf());
    }

    let extension = source.extension().unwrap_or("raw").to_string();
    let copy = unique_path(Path::new("source-copy"), &extension);
    tmp.register(copy.clone());

    let result = (|| -> io::Result<()> {
        let mut reader = source.open()?;
        let mut writer = File::create(&copy)?;
        io::copy(&mut reader, &mut writer)?;
        Ok(())
    })();

    if let Err(err) = result {
        fs::remove_file(&copy).ok();
        return Err(err);
    }

    Ok(copy)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::Cursor;

    /// A source with no local path, like an encrypted or object-store file.
    pub struct RemoteSource {
        pub content: Vec<u8>,
        pub extension: String,
        pub fail_read: bool,
    }

    impl RemoteSource {
        pub fn new(content: &[u8], extension: &str) -> Self {
            Self {
                content: content.to_vec(),
                extension: extension.to_string(),
                fail_read: false,
            }
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("storage backend dropped the connection"))
        }
    }

    impl SourceFile for RemoteSource {
        fn local_path(&self) -> Option<&Path> {
            None
        }

        fn open(&self) -> io::Result<Box<dyn Read>> {
            if self.fail_read {
                Ok(Box::new(FailingReader))
            } else {
                Ok(Box::new(Cursor::new(self.content.clone())))
            }
        }

        fn extension(&self) -> Option<&str> {
            Some(&self.extension)
        }
    }

    #[test]
    fn local_source_passes_path_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("shot.cr2");
        fs::write(&path, b"raw bytes").unwrap();

        let mut tmp = TempFileSet::new();
        let resolved = resolve_local(&LocalFile::new(&path), &mut tmp).unwrap();

        assert_eq!(resolved, path);
        // The source's own storage is never registered for deletion.
        assert_eq!(tmp.len(), 0);
    }

    #[test]
    fn remote_source_is_copied_and_registered() {
        let source = RemoteSource::new(b"remote raw content", "nef");
        let mut tmp = TempFileSet::new();

        let resolved = resolve_local(&source, &mut tmp).unwrap();
        assert_eq!(fs::read(&resolved).unwrap(), b"remote raw content");
        assert_eq!(tmp.len(), 1);
        assert!(resolved.extension().is_some_and(|e| e == "nef"));

        tmp.drain();
        assert!(!resolved.exists());
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        let source = RemoteSource {
            fail_read: true,
            ..RemoteSource::new(b"", "arw")
        };
        let mut tmp = TempFileSet::new();

        let err = resolve_local(&source, &mut tmp);
        assert!(err.is_err());

        // The partial file is gone already; draining finds nothing to do.
        tmp.drain();
    }

    #[test]
    fn local_file_extension_from_path() {
        let source = LocalFile::new("/photos/IMG_0001.CR2");
        assert_eq!(source.extension(), Some("CR2"));
    }
}
