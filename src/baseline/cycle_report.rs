use std::time::Duration;

use tracing::info;

/// Results of a single scan cycle. Reset at the start of every cycle and
/// discarded once emitted.
///
/// Path lists are in discovery order, which depends on how concurrent work
/// completes and is not stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub duration: Duration,
    pub directories: u64,
    pub files: u64,
    pub new_files: Vec<String>,
    pub changed_files: Vec<String>,
    /// Whether a prior baseline existed when this cycle ran.
    pub baseline_complete: bool,
    /// Whether a shutdown cut the walk short.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn new(baseline_complete: bool) -> Self {
        Self {
            baseline_complete,
            ..Self::default()
        }
    }

    /// Writes the report to the log.
    ///
    /// Counts are always written. The path lists only carry information once a
    /// baseline exists, so they are written only for baseline-complete cycles
    /// and only when non-empty.
    pub fn emit(&self) {
        info!(
            duration_ms = self.duration.as_millis() as u64,
            directories = self.directories,
            files = self.files,
            new_files = self.new_files.len(),
            changed_files = self.changed_files.len(),
            interrupted = self.interrupted,
            "Scan results"
        );

        if !self.baseline_complete {
            return;
        }

        if !self.new_files.is_empty() {
            info!(
                "The following files are new:\n\t{}",
                self.new_files.join("\n\t")
            );
        }
        if !self.changed_files.is_empty() {
            info!(
                "The following files have changed:\n\t{}",
                self.changed_files.join("\n\t")
            );
        }
    }
}
