//! Queries against the `borg` executable and parsing of its JSON output.

use crate::archive::{ArchiveInfo, EntryType, FileRecord, RepositoryInfo};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Format of `start` in `borg info --json`, always local-naive with microseconds
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum BorgError {
    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unexpected output from {query}: {source}")]
    Json {
        query: &'static str,
        source: serde_json::Error,
    },
    #[error("invalid archive timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("repository has no archives")]
    NoArchives,
    #[error("invalid archive listing at line {line}: {source}")]
    Listing {
        line: usize,
        source: serde_json::Error,
    },
}

// Only the fields we read are modelled; serde ignores the rest.

#[derive(Debug, Deserialize)]
struct RepoInfoOutput {
    cache: CacheOutput,
}

#[derive(Debug, Deserialize)]
struct CacheOutput {
    stats: CacheStats,
}

#[derive(Debug, Deserialize)]
struct CacheStats {
    unique_csize: u64,
}

#[derive(Debug, Deserialize)]
struct ArchiveInfoOutput {
    archives: Vec<ArchiveOutput>,
}

#[derive(Debug, Deserialize)]
struct ArchiveOutput {
    name: String,
    start: String,
}

#[derive(Debug, Deserialize)]
struct ListingLine {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    size: u64,
}

/// Parse `borg info <repo> --json`
pub fn parse_repository_info(output: &str) -> Result<RepositoryInfo, BorgError> {
    let parsed: RepoInfoOutput = serde_json::from_str(output).map_err(|source| BorgError::Json {
        query: "repository info",
        source,
    })?;

    Ok(RepositoryInfo {
        unique_size: parsed.cache.stats.unique_csize,
    })
}

/// Parse `borg info <repo> --last 1 --json`
pub fn parse_archive_info(output: &str) -> Result<ArchiveInfo, BorgError> {
    let parsed: ArchiveInfoOutput =
        serde_json::from_str(output).map_err(|source| BorgError::Json {
            query: "archive info",
            source,
        })?;

    let archive = parsed
        .archives
        .into_iter()
        .next()
        .ok_or(BorgError::NoArchives)?;

    Ok(ArchiveInfo {
        created_at: parse_timestamp(&archive.start)?,
        name: archive.name,
    })
}

/// Parse `borg list <repo>::<archive> --json-lines`, dropping directories
pub fn parse_file_listing(output: &str) -> Result<Vec<FileRecord>, BorgError> {
    let mut files = Vec::new();
    let mut skipped_dirs = 0usize;

    for (idx, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry = parse_listing_line(line)
            .map_err(|source| BorgError::Listing { line: idx + 1, source })?;

        match EntryType::from_tag(&entry.kind) {
            EntryType::Directory => skipped_dirs += 1,
            EntryType::Other => files.push(FileRecord::new(entry.path, entry.size)),
        }
    }

    log::debug!(
        "Parsed archive listing: {} files, {} directories skipped",
        files.len(),
        skipped_dirs
    );

    Ok(files)
}

/// Parse one listing record, retrying with lone surrogates replaced by U+FFFD.
///
/// Borg escapes file names that are not valid UTF-8 as unpaired `\udcXX`
/// surrogates, which serde_json rejects.
fn parse_listing_line(line: &str) -> Result<ListingLine, serde_json::Error> {
    serde_json::from_str(line).or_else(|err| {
        let cleaned = replace_lone_surrogates(line);
        if cleaned == line {
            return Err(err);
        }
        log::debug!("Replaced undecodable characters in listing record: {line}");
        serde_json::from_str(&cleaned).map_err(|_| err)
    })
}

/// Rewrite `\uXXXX` escapes of unpaired surrogates as `\ufffd`.
fn replace_lone_surrogates(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        match unicode_escape(rest) {
            Some(0xD800..=0xDBFF) if matches!(unicode_escape(&rest[6..]), Some(0xDC00..=0xDFFF)) => {
                out.push_str(&rest[..12]);
                rest = &rest[12..];
            }
            Some(0xD800..=0xDFFF) => {
                out.push_str("\\ufffd");
                rest = &rest[6..];
            }
            _ => {
                // Backslash plus the escaped character, e.g. `\\` or `\"`
                let len = rest[1..].chars().next().map_or(1, |c| 1 + c.len_utf8());
                out.push_str(&rest[..len]);
                rest = &rest[len..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Code unit of a `\uXXXX` escape at the start of `s`
fn unicode_escape(s: &str) -> Option<u16> {
    let hex = s.strip_prefix("\\u")?.get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(hex, 16).ok()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, BorgError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| BorgError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Runs borg subcommands against a single repository
#[derive(Debug, Clone)]
pub struct Borg {
    program: PathBuf,
    repository: OsString,
}

impl Borg {
    /// Create a client for `repository` using the given borg executable
    pub fn new(program: impl Into<PathBuf>, repository: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            repository: repository.into(),
        }
    }

    /// Deduplicated size of the whole repository
    pub fn repository_info(&self) -> Result<RepositoryInfo, BorgError> {
        let output = self.run(&[
            OsString::from("info"),
            self.repository.clone(),
            OsString::from("--json"),
        ])?;
        parse_repository_info(&output)
    }

    /// Name and creation time of the most recent archive
    pub fn latest_archive(&self) -> Result<ArchiveInfo, BorgError> {
        let output = self.run(&[
            OsString::from("info"),
            self.repository.clone(),
            OsString::from("--last"),
            OsString::from("1"),
            OsString::from("--json"),
        ])?;
        parse_archive_info(&output)
    }

    /// Every non-directory entry of `archive`
    pub fn list_files(&self, archive: &ArchiveInfo) -> Result<Vec<FileRecord>, BorgError> {
        let mut location = self.repository.clone();
        location.push("::");
        location.push(&archive.name);

        let output = self.run(&[
            OsString::from("list"),
            location,
            OsString::from("--json-lines"),
        ])?;
        parse_file_listing(&output)
    }

    /// Run borg to completion and return its stdout
    fn run(&self, args: &[OsString]) -> Result<String, BorgError> {
        let command = self.command_line(args);
        log::debug!("Running {command}");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| BorgError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        log::debug!(
            "{command} exited with {}, {} bytes stdout, {} bytes stderr",
            output.status,
            output.stdout.len(),
            output.stderr.len()
        );

        if !output.status.success() {
            return Err(BorgError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn command_line(&self, args: &[OsString]) -> String {
        let mut line = self.program.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Display name of a repository: the last component of its location
pub fn repository_name(location: &str) -> String {
    // Remote locations like `ssh://host/./repo` or `user@host:repo`
    let path_part = if is_remote(location) {
        location.rsplit_once(':').map_or(location, |(_, rest)| rest)
    } else {
        location
    };

    Path::new(path_part)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.to_string())
}

/// Whether `location` names a remote repository rather than a local path
pub fn is_remote(location: &str) -> bool {
    if location.contains("://") {
        return true;
    }
    // scp-style `user@host:path`; a single letter before ':' is a Windows drive
    match location.split_once(':') {
        Some((host, _)) => host.len() > 1 && !host.contains('/') && !host.contains('\\'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const REPO_INFO: &str = r#"{
        "cache": {
            "path": "/root/.cache/borg/abc",
            "stats": {
                "total_chunks": 100,
                "total_csize": 9000,
                "total_size": 12000,
                "total_unique_chunks": 50,
                "unique_csize": 4321,
                "unique_size": 6000
            }
        },
        "encryption": {"mode": "repokey"},
        "repository": {"id": "abc", "location": "/backups/repo"}
    }"#;

    const ARCHIVE_INFO: &str = r#"{
        "archives": [{
            "name": "host-2024-03-05T10:00:00",
            "start": "2024-03-05T10:00:01.123456",
            "end": "2024-03-05T10:02:00.000000",
            "stats": {"nfiles": 3}
        }],
        "cache": {"stats": {"unique_csize": 1}}
    }"#;

    #[test]
    fn test_parse_repository_info() {
        let info = parse_repository_info(REPO_INFO).unwrap();
        assert_eq!(info.unique_size, 4321);
    }

    #[test]
    fn test_parse_repository_info_missing_field() {
        let err = parse_repository_info(r#"{"cache": {"stats": {}}}"#).unwrap_err();
        assert!(matches!(err, BorgError::Json { query: "repository info", .. }));
    }

    #[test]
    fn test_parse_repository_info_wrong_type() {
        let err =
            parse_repository_info(r#"{"cache": {"stats": {"unique_csize": "big"}}}"#).unwrap_err();
        assert!(matches!(err, BorgError::Json { .. }));
    }

    #[test]
    fn test_parse_archive_info() {
        let info = parse_archive_info(ARCHIVE_INFO).unwrap();
        assert_eq!(info.name, "host-2024-03-05T10:00:00");
        assert_eq!(info.created_at.year(), 2024);
        assert_eq!(info.created_at.month(), 3);
        assert_eq!(info.created_at.second(), 1);
        assert_eq!(info.created_at.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_archive_info_no_archives() {
        let err = parse_archive_info(r#"{"archives": []}"#).unwrap_err();
        assert!(matches!(err, BorgError::NoArchives));
    }

    #[test]
    fn test_parse_archive_info_bad_timestamp() {
        let err =
            parse_archive_info(r#"{"archives": [{"name": "a", "start": "yesterday"}]}"#).unwrap_err();
        assert!(matches!(err, BorgError::Timestamp { .. }));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_parse_file_listing_skips_directories() {
        let listing = concat!(
            r#"{"type": "d", "mode": "drwxr-xr-x", "path": "home", "size": 0}"#,
            "\n",
            r#"{"type": "-", "mode": "-rw-r--r--", "path": "home/a.txt", "size": 10}"#,
            "\n\n",
            r#"{"type": "l", "mode": "lrwxrwxrwx", "path": "home/link", "size": 0}"#,
            "\r\n",
        );
        let files = parse_file_listing(listing).unwrap();

        assert_eq!(
            files,
            vec![FileRecord::new("home/a.txt", 10), FileRecord::new("home/link", 0)]
        );
    }

    #[test]
    fn test_parse_file_listing_undecodable_name() {
        let listing = concat!(
            r#"{"type": "-", "path": "home/caf\udce9.txt", "size": 10}"#,
            "\n",
            r#"{"type": "-", "path": "home/\ud83d\ude00 and \\udce9", "size": 5}"#,
        );
        let files = parse_file_listing(listing).unwrap();

        assert_eq!(
            files,
            vec![
                FileRecord::new("home/caf\u{FFFD}.txt", 10),
                FileRecord::new("home/\u{1F600} and \\udce9", 5),
            ]
        );
    }

    #[test]
    fn test_replace_lone_surrogates() {
        assert_eq!(replace_lone_surrogates(r"a\udce9b"), r"a\ufffdb");
        assert_eq!(replace_lone_surrogates(r"\ud800\ud800"), r"\ufffd\ufffd");
        assert_eq!(replace_lone_surrogates(r"\ud83d\ude00"), r"\ud83d\ude00");
        assert_eq!(replace_lone_surrogates(r"\\udce9 \n \u00e9"), r"\\udce9 \n \u00e9");
        assert_eq!(replace_lone_surrogates(r"trailing \ud8"), r"trailing \ud8");
    }

    #[test]
    fn test_parse_file_listing_empty() {
        assert!(parse_file_listing("").unwrap().is_empty());
        assert!(parse_file_listing("\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_file_listing_reports_line() {
        let listing = concat!(
            r#"{"type": "-", "path": "a/b", "size": 1}"#,
            "\n",
            r#"{"type": "-", "path": "a/c"}"#,
        );
        let err = parse_file_listing(listing).unwrap_err();
        assert!(matches!(err, BorgError::Listing { line: 2, .. }));
    }

    #[test]
    fn test_repository_name() {
        assert_eq!(repository_name("/backups/laptop"), "laptop");
        assert_eq!(repository_name("/backups/laptop/"), "laptop");
        assert_eq!(repository_name("relative/repo"), "repo");
        assert_eq!(repository_name("ssh://user@host:22/./backups/nas"), "nas");
        assert_eq!(repository_name("user@host:backups/nas"), "nas");
        assert_eq!(repository_name("/"), "/");
        assert_eq!(repository_name("/backups/repo:2024"), "repo:2024");
        assert_eq!(repository_name("./dir:with/colon"), "colon");
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("ssh://user@host/./repo"));
        assert!(is_remote("user@host:repo"));
        assert!(!is_remote("/backups/repo"));
        assert!(!is_remote("C:\\backups\\repo"));
        assert!(!is_remote("./dir:with/colon"));
    }

    #[test]
    fn test_command_line() {
        let borg = Borg::new("borg", "/backups/repo");
        let line = borg.command_line(&[OsString::from("info"), OsString::from("--json")]);
        assert_eq!(line, "borg info --json");
    }

    #[test]
    fn test_missing_executable() {
        let borg = Borg::new("/nonexistent/borg-binary", "/backups/repo");
        let err = borg.repository_info().unwrap_err();
        assert!(matches!(err, BorgError::Spawn { .. }));
    }
}
