use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Periodically fingerprints every file under a path and reports which files
/// are new or have changed since the previous scan.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// The file or directory to scan
    #[clap(long, short = 's')]
    pub scan_path: PathBuf,

    /// Milliseconds to wait between scans; without it the scan runs once
    #[clap(long, short, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// File to write log output to instead of the console
    #[clap(long, short = 'l')]
    pub log_path: Option<PathBuf>,

    /// File the scan data is persisted to and loaded from on startup.
    /// When it is missing the first scan establishes a new baseline
    #[clap(long, short = 'p')]
    pub persist_path: Option<PathBuf>,

    /// Number of scan worker threads; defaults to the available parallelism
    #[clap(long, short)]
    pub workers: Option<NonZeroUsize>,

    #[clap(long, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}
