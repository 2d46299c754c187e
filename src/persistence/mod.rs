//! Durable storage of the baseline between process runs.

mod baseline_file;

pub use baseline_file::{BaselineFile, default_baseline_path};
