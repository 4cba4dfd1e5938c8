//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Metadata about a file
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub file_type: FileType,
}

/// Type of file system entry, after following symlinks.
///
/// `Other` covers dangling links, sockets and devices: anything the scanner
/// can neither descend into nor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Other,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
    /// The entry itself is a symbolic link (its `file_type` is the target's)
    pub is_symlink: bool,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }
}

/// Read-only view of the project tree.
///
/// Detection never writes through this trait; the only write in a run is the
/// final config file, which the CLI performs itself.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// List directory contents, sorted by file name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Resolve symlinks to the real path (used for cycle detection)
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}
