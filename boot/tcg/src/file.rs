//! # File Access
//!
//! Read-only byte access to files named by path. The boot environment
//! supplies the implementation; [`MemoryFiles`] serves preloaded images and
//! [`HostFiles`] (feature `std`) reads through `std::fs`.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Source of file contents
pub trait FileSource {
    /// Read a whole file
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, FileError>;
}

impl<T: FileSource + ?Sized> FileSource for &mut T {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        (**self).read_file(path)
    }
}

/// File access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileError {
    /// No file at that path
    NotFound,
    /// The path names something that is not a regular file
    NotAFile,
    /// Access denied
    PermissionDenied,
    /// The path is empty or malformed
    InvalidPath,
    /// Device or filesystem error while reading
    Io,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound => write!(f, "file not found"),
            FileError::NotAFile => write!(f, "not a regular file"),
            FileError::PermissionDenied => write!(f, "permission denied"),
            FileError::InvalidPath => write!(f, "invalid path"),
            FileError::Io => write!(f, "read error"),
        }
    }
}

// =============================================================================
// IN-MEMORY FILES
// =============================================================================

/// Files held in memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFiles {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files.insert(String::from(path), contents.into());
    }

    /// Builder form of [`MemoryFiles::insert`]
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if there are no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSource for MemoryFiles {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        if path.is_empty() {
            return Err(FileError::InvalidPath);
        }
        self.files.get(path).cloned().ok_or(FileError::NotFound)
    }
}

// =============================================================================
// HOST FILES
// =============================================================================

/// Files read from the host filesystem
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFiles;

#[cfg(feature = "std")]
impl FileSource for HostFiles {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        use std::io::ErrorKind;

        if path.is_empty() {
            return Err(FileError::InvalidPath);
        }
        let meta = std::fs::metadata(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => FileError::NotFound,
            ErrorKind::PermissionDenied => FileError::PermissionDenied,
            _ => FileError::Io,
        })?;
        if !meta.is_file() {
            return Err(FileError::NotAFile);
        }
        std::fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied => FileError::PermissionDenied,
            _ => FileError::Io,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_files() {
        let mut files = MemoryFiles::new().with_file("/boot/grub/kernel.img", &b"kernel"[..]);
        assert_eq!(files.len(), 1);
        assert_eq!(files.read_file("/boot/grub/kernel.img").unwrap(), b"kernel");
        assert_eq!(files.read_file("/boot/missing"), Err(FileError::NotFound));
        assert_eq!(files.read_file(""), Err(FileError::InvalidPath));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_host_files_missing() {
        let mut files = HostFiles;
        assert_eq!(
            files.read_file("/nonexistent/tcgboot/file.img"),
            Err(FileError::NotFound)
        );
    }
}
