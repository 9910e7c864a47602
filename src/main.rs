//! borg-repo-stats: where did the space in a Borg repository go?
//!
//! Queries `borg` for the deduplicated repository size and the contents of
//! the latest archive, then reports the directories holding the most files
//! and the most bytes.

mod aggregate;
mod archive;
mod borg;
mod cli;
mod display;
mod report;

use anyhow::{Context, Result};
use borg::Borg;
use cli::Args;
use display::Display;
use indicatif::{ProgressBar, ProgressStyle};
use report::Report;
use std::path::Path;
use std::time::Duration;

fn main() -> Result<()> {
    // Example: RUST_LOG=debug borg-repo-stats /path/to/repo
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse_args();

    // Local repositories must exist; remote ones are left to borg
    if !borg::is_remote(&args.repository) {
        let path = Path::new(&args.repository);
        if !path.exists() {
            anyhow::bail!(
                "Cannot access repository '{}': No such file or directory",
                path.display()
            );
        }
    }

    let report = collect_report(&args)?;

    let display = Display::new()
        .with_count(args.count)
        .with_show_size(args.show_size);
    display.print_report(&report, args.output_format())?;

    Ok(())
}

/// Run the three borg queries and build the report
fn collect_report(args: &Args) -> Result<Report> {
    let repository = &args.repository;
    let borg = Borg::new(&args.borg, repository);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let report = query_report(args, &borg, &pb);
    pb.finish_and_clear();
    report
}

fn query_report(args: &Args, borg: &Borg, pb: &ProgressBar) -> Result<Report> {
    let repository = &args.repository;

    pb.set_message("Reading repository info...");
    let repository_info = borg
        .repository_info()
        .with_context(|| format!("Failed to query repository info for '{repository}'"))?;

    pb.set_message("Finding latest archive...");
    let archive = borg
        .latest_archive()
        .with_context(|| format!("Failed to query latest archive of '{repository}'"))?;

    pb.set_message(format!("Listing archive {}...", archive.name));
    let files = borg
        .list_files(&archive)
        .with_context(|| format!("Failed to list archive '{}'", archive.name))?;

    pb.set_message("Aggregating directory sizes...");
    let stats = aggregate::aggregate(&files);
    if stats.is_empty() {
        log::warn!("Archive {} contains no files inside directories", archive.name);
    }
    log::info!(
        "Archive {} has {} files in {} directories",
        archive.name,
        files.len(),
        stats.len()
    );

    let report = Report::build(
        borg::repository_name(repository),
        &repository_info,
        &archive,
        stats,
        args.count,
    );

    Ok(report)
}
