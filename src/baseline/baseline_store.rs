use std::collections::HashMap;

use derive_more::Display;

use crate::baseline::CycleReport;
use crate::digest::Fingerprint;

/// How an observed file relates to the last fingerprint recorded for its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Classification {
    #[display("new")]
    New,
    #[display("changed")]
    Changed,
    #[display("unchanged")]
    Unchanged,
}

/// Most recent fingerprint of every path seen across all scans.
///
/// Only the latest fingerprint per path is kept, so "changed" always means
/// "differs from the previous observation", not "differs from the first one".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineStore {
    entries: HashMap<String, Fingerprint>,
    baseline_complete: bool,
}

impl BaselineStore {
    /// Empty store for a baseline-establishing first cycle.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store seeded from a persisted baseline.
    pub fn from_entries(entries: HashMap<String, Fingerprint>) -> Self {
        Self {
            entries,
            baseline_complete: true,
        }
    }

    pub fn entries(&self) -> &HashMap<String, Fingerprint> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_baseline_complete(&self) -> bool {
        self.baseline_complete
    }

    pub fn mark_baseline_complete(&mut self) {
        self.baseline_complete = true;
    }

    /// Classifies a freshly digested file and records it.
    ///
    /// New paths always land in the report. Changed paths land in the report
    /// only once a baseline exists; during the baseline-establishing cycle the
    /// difference is absorbed silently. The stored fingerprint is updated in
    /// both cases.
    pub fn observe(
        &mut self,
        path: String,
        fingerprint: Fingerprint,
        report: &mut CycleReport,
    ) -> Classification {
        match self.entries.get_mut(&path) {
            None => {
                self.entries.insert(path.clone(), fingerprint);
                report.new_files.push(path);
                Classification::New
            }
            Some(previous) if *previous != fingerprint => {
                *previous = fingerprint;
                if self.baseline_complete {
                    report.changed_files.push(path);
                }
                Classification::Changed
            }
            Some(_) => Classification::Unchanged,
        }
    }
}
