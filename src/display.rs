//! Output formatting and display logic.

use crate::archive::DirectoryAggregate;
use crate::report::{DEFAULT_TOP, Report};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use humansize::{DECIMAL, format_size};
use owo_colors::OwoColorize;
use std::fmt::Write;

/// Output format of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// Aligned, colored text
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// Display configuration
pub struct Display {
    /// Number of directories the report was built with
    pub count: usize,
    /// Show directory sizes next to file counts
    pub show_size: bool,
    /// Maximum path width before truncation
    pub max_path_width: usize,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            count: DEFAULT_TOP,
            show_size: false,
            max_path_width: 60,
        }
    }
}

impl Display {
    /// Create a new Display with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of items in each ranking
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Show sizes in the file count ranking
    pub fn with_show_size(mut self, show_size: bool) -> Self {
        self.show_size = show_size;
        self
    }

    /// Print the report to stdout in the requested format
    pub fn print_report(&self, report: &Report, format: Format) -> Result<()> {
        match format {
            Format::Text => print!("{}", self.render_text(report, Utc::now())),
            Format::Json => println!("{}", render_json(report)?),
        }
        Ok(())
    }

    /// Render the text report; `now` anchors the relative archive age
    pub fn render_text(&self, report: &Report, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        self.write_text(&mut out, report, now)
            .expect("writing to a String cannot fail");
        out
    }

    fn write_text(&self, out: &mut String, report: &Report, now: DateTime<Utc>) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "{}", "═".repeat(70).dimmed())?;
        writeln!(
            out,
            "{}",
            format!(" Borg Repository Report: {}", report.repository_name).bold()
        )?;
        writeln!(out, "{}", "═".repeat(70).dimmed())?;
        writeln!(out)?;

        writeln!(
            out,
            "  {} {}",
            "Repository:    ".dimmed(),
            report.repository_name.cyan()
        )?;
        writeln!(
            out,
            "  {} {}",
            "Total size:    ".dimmed(),
            format_size(report.total_size_bytes, DECIMAL).green().bold()
        )?;
        writeln!(
            out,
            "  {} {}",
            "Latest archive:".dimmed(),
            report.latest_archive_name.cyan()
        )?;
        writeln!(
            out,
            "  {} {}",
            "Created:       ".dimmed(),
            format_relative_time(report.latest_archive_created_at, now)
        )?;

        self.write_section(out, "by file count")?;
        if self.show_size {
            writeln!(
                out,
                "  {:>10}  {:>12}  {}",
                "FILES".dimmed().bold(),
                "SIZE".dimmed().bold(),
                "PATH".dimmed().bold()
            )?;
        } else {
            writeln!(
                out,
                "  {:>10}  {}",
                "FILES".dimmed().bold(),
                "PATH".dimmed().bold()
            )?;
        }
        if report.top_by_count.is_empty() {
            writeln!(out, "  {}", "No directories found.".dimmed())?;
        }
        for dir in &report.top_by_count {
            self.write_count_row(out, dir)?;
        }

        self.write_section(out, "by size")?;
        writeln!(
            out,
            "  {:>12}  {}",
            "SIZE".dimmed().bold(),
            "PATH".dimmed().bold()
        )?;
        if report.top_by_size.is_empty() {
            writeln!(out, "  {}", "No directories found.".dimmed())?;
        }
        for dir in &report.top_by_size {
            writeln!(
                out,
                "  {:>12}  {}",
                format_size(dir.size_bytes, DECIMAL).green(),
                self.truncate_path(&dir.path).blue().bold()
            )?;
        }

        writeln!(out)?;
        writeln!(out, "{}", "═".repeat(70).dimmed())
    }

    fn write_section(&self, out: &mut String, title: &str) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "{}", "─".repeat(70).dimmed())?;
        writeln!(
            out,
            "{}",
            format!(" Top {} directories {} (latest archive):", self.count, title).bold()
        )?;
        writeln!(out, "{}", "─".repeat(70).dimmed())?;
        writeln!(out)
    }

    fn write_count_row(&self, out: &mut String, dir: &DirectoryAggregate) -> std::fmt::Result {
        let path = self.truncate_path(&dir.path);
        if self.show_size {
            writeln!(
                out,
                "  {:>10}  {:>12}  {}",
                dir.file_count.cyan(),
                format_size(dir.size_bytes, DECIMAL).green(),
                path.blue().bold()
            )
        } else {
            writeln!(out, "  {:>10}  {}", dir.file_count.cyan(), path.blue().bold())
        }
    }

    /// Truncate a path if it's too long, keeping its tail
    fn truncate_path(&self, path: &str) -> String {
        let len = path.chars().count();
        if len <= self.max_path_width {
            path.to_string()
        } else {
            let skip = len - self.max_path_width + 3;
            format!("...{}", path.chars().skip(skip).collect::<String>())
        }
    }
}

/// Serialize the report as pretty-printed JSON
pub fn render_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Describe `then` relative to `now`, e.g. "3 days ago" or "in 5 minutes"
pub fn format_relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let delta = now.signed_duration_since(then).num_seconds();
    let secs = delta.abs();

    if secs < 1 {
        return "just now".to_string();
    }

    let (amount, unit) = if secs < MINUTE {
        (secs, "second")
    } else if secs < HOUR {
        (secs / MINUTE, "minute")
    } else if secs < DAY {
        (secs / HOUR, "hour")
    } else if secs < WEEK {
        (secs / DAY, "day")
    } else if secs < MONTH {
        (secs / WEEK, "week")
    } else if secs < YEAR {
        (secs / MONTH, "month")
    } else {
        (secs / YEAR, "year")
    };

    let plural = if amount == 1 { "" } else { "s" };
    if delta < 0 {
        format!("in {amount} {unit}{plural}")
    } else {
        format!("{amount} {unit}{plural} ago")
    }
}
