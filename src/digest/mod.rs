//! Content fingerprinting of individual files.

mod fingerprint;

pub use fingerprint::{DigestError, Fingerprint};
