//! Ranking of directory aggregates and assembly of the final report.

use crate::aggregate::DirectoryStats;
use crate::archive::{ArchiveInfo, DirectoryAggregate, RepositoryInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of directories shown per ranking unless configured otherwise
pub const DEFAULT_TOP: usize = 10;

/// Sort by size descending; equal sizes are ordered by path.
pub fn rank_by_size(dirs: &mut [DirectoryAggregate]) {
    dirs.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Sort by file count descending; equal counts put the shorter path string first.
///
/// Paths of equal length fall back to lexicographic order so the result does
/// not depend on map iteration order.
pub fn rank_by_count(dirs: &mut [DirectoryAggregate]) {
    dirs.sort_by(|a, b| {
        b.file_count
            .cmp(&a.file_count)
            .then_with(|| a.path.len().cmp(&b.path.len()))
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// The first `n` entries, or all of them if there are fewer
pub fn top_n<T>(items: &[T], n: usize) -> &[T] {
    let end = std::cmp::min(n, items.len());
    &items[..end]
}

/// Usage report for the latest archive of a repository
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub repository_name: String,
    pub total_size_bytes: u64,
    pub latest_archive_name: String,
    pub latest_archive_created_at: DateTime<Utc>,
    pub top_by_count: Vec<DirectoryAggregate>,
    pub top_by_size: Vec<DirectoryAggregate>,
}

impl Report {
    /// Rank `stats` both ways and keep the top `count` of each
    pub fn build(
        repository_name: impl Into<String>,
        repository: &RepositoryInfo,
        archive: &ArchiveInfo,
        stats: DirectoryStats,
        count: usize,
    ) -> Self {
        let mut by_size = stats.into_aggregates();
        let mut by_count = by_size.clone();

        rank_by_size(&mut by_size);
        rank_by_count(&mut by_count);

        Self {
            repository_name: repository_name.into(),
            total_size_bytes: repository.unique_size,
            latest_archive_name: archive.name.clone(),
            latest_archive_created_at: archive.created_at,
            top_by_count: top_n(&by_count, count).to_vec(),
            top_by_size: top_n(&by_size, count).to_vec(),
        }
    }
}
