//! Rolls per-file sizes up into every ancestor directory.
//!
//! Directories are identified purely by their path string; no tree is built.
//! A file at depth k (k directory segments above it) adds itself to exactly
//! k entries, one per path prefix.

use crate::archive::{DirectoryAggregate, FileRecord};
use std::collections::HashMap;

/// Separator used by Borg archive listings on every platform
const SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Totals {
    file_count: u64,
    size_bytes: u64,
}

/// Per-directory totals for one archive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectoryStats {
    dirs: HashMap<String, Totals>,
    /// Files that contributed to at least one directory
    pub files_counted: u64,
    /// Files at the archive root, not part of any directory total
    pub files_without_parent: u64,
}

impl DirectoryStats {
    /// Number of distinct directories
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Look up the totals for a single directory
    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<DirectoryAggregate> {
        self.dirs
            .get(path)
            .map(|t| DirectoryAggregate::new(path, t.file_count, t.size_bytes))
    }

    /// Consume the stats, yielding one aggregate per directory in no particular order
    pub fn into_aggregates(self) -> Vec<DirectoryAggregate> {
        self.dirs
            .into_iter()
            .map(|(path, t)| DirectoryAggregate::new(path, t.file_count, t.size_bytes))
            .collect()
    }
}

/// Aggregate file counts and sizes for every ancestor directory of `files`.
pub fn aggregate<'a, I>(files: I) -> DirectoryStats
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    let mut stats = DirectoryStats::default();

    for file in files {
        let parents = parent_segments(&file.path);
        if parents.is_empty() {
            stats.files_without_parent += 1;
            continue;
        }
        stats.files_counted += 1;

        // Propagate the file into each prefix: "a", "a/b", "a/b/c", ...
        let mut prefix = String::with_capacity(file.path.len());
        for segment in parents {
            if !prefix.is_empty() {
                prefix.push(SEPARATOR);
            }
            prefix.push_str(segment);

            let totals = stats.dirs.entry(prefix.clone()).or_default();
            totals.file_count += 1;
            totals.size_bytes += file.size_bytes;
        }
    }

    log::debug!(
        "Aggregated {} files into {} directories ({} at archive root)",
        stats.files_counted,
        stats.dirs.len(),
        stats.files_without_parent
    );

    stats
}

/// Directory segments of `path`, i.e. everything except the final file name.
///
/// Empty segments are skipped. A backslash is an ordinary file name character.
fn parent_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path
        .split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();
    segments.pop();
    segments
}
