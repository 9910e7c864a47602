//! Data structures describing a Borg repository and the files in an archive.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Repository-level figures from `borg info <repo>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Storage consumed after deduplication and compression
    pub unique_size: u64,
}

/// Identity of a single archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of item in an archive listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Directory,
    /// Regular files, symlinks, hardlinks, devices and fifos
    Other,
}

impl EntryType {
    /// Map a Borg type tag (`d`, `-`, `l`, `h`, ...) to an entry type
    pub fn from_tag(tag: &str) -> Self {
        if tag == "d" {
            EntryType::Directory
        } else {
            EntryType::Other
        }
    }
}

/// A single non-directory entry in the latest archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the archive root, `/`-separated
    pub path: String,
    /// Size in bytes
    pub size_bytes: u64,
}

impl FileRecord {
    /// Create a new FileRecord
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}

/// Rolled-up totals for every file below a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryAggregate {
    /// Full directory path from the archive root
    pub path: String,
    /// Number of files (not subdirectories) transitively contained
    pub file_count: u64,
    /// Sum of the sizes of those files
    pub size_bytes: u64,
}

impl DirectoryAggregate {
    pub fn new(path: impl Into<String>, file_count: u64, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            file_count,
            size_bytes,
        }
    }
}
