//! Command-line argument parsing using clap derive macros.

use crate::display::Format;
use crate::report::DEFAULT_TOP;
use clap::Parser;
use clap::builder::TypedValueParser;
use std::path::PathBuf;

/// Print statistics about a Borg Backup repository.
///
/// Shows the deduplicated repository size, the latest archive, and the
/// directories of that archive holding the most files and the most bytes.
#[derive(Parser, Debug)]
#[command(name = "borg-repo-stats")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path (or remote location) of the Borg repository
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Output JSON (same as --format json)
    #[arg(long, conflicts_with = "format")]
    pub json: bool,

    /// Number of directories to show in each ranking
    #[arg(
        short = 'n',
        long = "count",
        default_value_t = DEFAULT_TOP,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    pub count: usize,

    /// Show directory sizes next to file counts
    #[arg(short = 's', long = "show-size")]
    pub show_size: bool,

    /// Borg executable to run
    #[arg(long = "borg", env = "BORG_BIN", default_value = "borg")]
    pub borg: PathBuf,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Effective output format after applying `--json`
    pub fn output_format(&self) -> Format {
        if self.json { Format::Json } else { self.format }
    }
}
