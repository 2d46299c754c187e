use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::persistence::default_baseline_path;

/// Everything the scan loop needs to know, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub scan_root: PathBuf,
    /// Delay between cycles; `None` runs a single cycle.
    pub interval: Option<Duration>,
    pub persist_path: PathBuf,
    /// Worker pool size; `None` uses the available parallelism.
    pub workers: Option<NonZeroUsize>,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            scan_root: cli.scan_path,
            interval: cli.interval.map(Duration::from_millis),
            persist_path: cli.persist_path.unwrap_or_else(default_baseline_path),
            workers: cli.workers,
        }
    }
}
