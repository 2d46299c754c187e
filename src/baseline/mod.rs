//! In-memory baseline of path fingerprints and per-cycle change reporting.

mod baseline_store;
mod cycle_report;

pub use baseline_store::BaselineStore;
pub use cycle_report::CycleReport;
