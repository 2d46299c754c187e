use std::collections::HashMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use compio::BufResult;
use compio::fs;
use directories::ProjectDirs;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::digest::Fingerprint;

const APPLICATION_NAME: &str = "watchman";
const BASELINE_FILE_NAME: &str = "previous-scan-data";
const FALLBACK_DATA_DIR: &str = ".watchman";
const FORMAT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

/// Location of the baseline when none is configured: the platform data
/// directory for the application, or `.watchman/` under the working directory
/// when the platform has none.
pub fn default_baseline_path() -> PathBuf {
    ProjectDirs::from("", "", APPLICATION_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
        .join(BASELINE_FILE_NAME)
}

#[derive(Debug, Encode, Decode)]
struct PersistedBaseline {
    format_version: u32,
    entries: HashMap<String, Fingerprint>,
}

/// Durable copy of the baseline: a zstd-compressed bincode blob.
#[derive(Debug, Clone)]
pub struct BaselineFile {
    path: PathBuf,
}

impl BaselineFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<HashMap<String, Fingerprint>, LoadError> {
        debug!("Reading baseline from {}", self.path.display());
        let compressed = fs::read(&self.path).await.context(ReadSnafu {
            path: self.path.clone(),
        })?;
        let bytes = zstd::decode_all(compressed.as_slice()).context(DecompressSnafu)?;
        let (persisted, _): (PersistedBaseline, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())
                .context(DecodeSnafu)?;

        if persisted.format_version != FORMAT_VERSION {
            return UnsupportedVersionSnafu {
                found: persisted.format_version,
            }
            .fail();
        }

        info!(
            "Loaded baseline of {} files from {}",
            persisted.entries.len(),
            self.path.display()
        );
        Ok(persisted.entries)
    }

    /// Writes the full mapping, creating missing parent directories first.
    ///
    /// The blob goes to a sibling temporary file which is then renamed over
    /// the target, so a crash mid-save leaves the previous baseline intact.
    pub async fn save(&self, entries: &HashMap<String, Fingerprint>) -> Result<(), SaveError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.context(CreateParentSnafu {
                path: parent.to_path_buf(),
            })?;
        }

        let persisted = PersistedBaseline {
            format_version: FORMAT_VERSION,
            entries: entries.clone(),
        };
        let bytes = bincode::encode_to_vec(&persisted, bincode::config::standard())
            .context(EncodeSnafu)?;
        let compressed = zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL).context(CompressSnafu)?;

        let temp_path = self.temp_path();
        let BufResult(result, _) = fs::write(&temp_path, compressed).await;
        result.context(WriteSnafu {
            path: temp_path.clone(),
        })?;
        fs::rename(&temp_path, &self.path)
            .await
            .context(RenameSnafu {
                path: self.path.clone(),
            })?;

        debug!(
            "Persisted baseline of {} files to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| OsString::from(BASELINE_FILE_NAME));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[derive(Debug, Snafu)]
pub enum LoadError {
    #[snafu(display("Failed to read baseline file '{}'", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Baseline file is not a valid zstd stream"))]
    Decompress { source: std::io::Error },
    #[snafu(display("Baseline file could not be decoded"))]
    Decode { source: bincode::error::DecodeError },
    #[snafu(display("Baseline file has unsupported format version {found}"))]
    UnsupportedVersion { found: u32 },
}

impl LoadError {
    /// True when there simply is no baseline yet, as on a first run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Read { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

#[derive(Debug, Snafu)]
pub enum SaveError {
    #[snafu(display("Failed to create baseline directory '{}'", path.display()))]
    CreateParent {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to encode baseline"))]
    Encode { source: bincode::error::EncodeError },
    #[snafu(display("Failed to compress baseline"))]
    Compress { source: std::io::Error },
    #[snafu(display("Failed to write baseline to '{}'", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to move baseline into place at '{}'", path.display()))]
    Rename {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_entries() -> HashMap<String, Fingerprint> {
        HashMap::from([
            ("/srv/app/config.yaml".to_string(), Fingerprint::of_bytes(b"config")),
            ("/srv/app/bin/server".to_string(), Fingerprint::of_bytes(b"server")),
            ("/srv/app/äöü 🚀.txt".to_string(), Fingerprint::of_bytes(b"")),
        ])
    }

    #[compio::test]
    async fn test_save_then_load_round_trips() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = BaselineFile::new(temp_dir.path().join("previous-scan-data"));
        let entries = sample_entries();

        file.save(&entries).await.expect("Failed to save baseline");
        let loaded = file.load().await.expect("Failed to load baseline");

        assert_eq!(loaded, entries);
    }

    #[compio::test]
    async fn test_save_empty_mapping_round_trips() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = BaselineFile::new(temp_dir.path().join("previous-scan-data"));

        file.save(&HashMap::new()).await.expect("Failed to save baseline");
        let loaded = file.load().await.expect("Failed to load baseline");

        assert!(loaded.is_empty());
    }

    #[compio::test]
    async fn test_save_creates_missing_parent_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let target = temp_dir.path().join("nested/data/previous-scan-data");
        let file = BaselineFile::new(&target);

        file.save(&sample_entries()).await.expect("Failed to save baseline");

        assert!(target.is_file());
        assert!(!file.temp_path().exists());
    }

    #[compio::test]
    async fn test_save_overwrites_previous_baseline() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = BaselineFile::new(temp_dir.path().join("previous-scan-data"));
        file.save(&sample_entries()).await.unwrap();

        let replacement = HashMap::from([("/only".to_string(), Fingerprint::of_bytes(b"x"))]);
        file.save(&replacement).await.unwrap();

        assert_eq!(file.load().await.unwrap(), replacement);
    }

    #[compio::test]
    async fn test_load_missing_file_is_not_found() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = BaselineFile::new(temp_dir.path().join("absent"));

        let error = file.load().await.expect_err("Expected missing baseline");

        assert!(error.is_not_found());
    }

    #[compio::test]
    async fn test_load_garbage_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("previous-scan-data");
        std::fs::write(&path, b"definitely not a baseline").unwrap();

        let error = BaselineFile::new(&path)
            .load()
            .await
            .expect_err("Expected corrupt baseline");

        assert!(matches!(error, LoadError::Decompress { .. }));
        assert!(!error.is_not_found());
    }

    #[compio::test]
    async fn test_load_valid_zstd_with_bad_payload_is_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("previous-scan-data");
        let compressed = zstd::encode_all(&[0xffu8, 0xff, 0xff][..], ZSTD_LEVEL).unwrap();
        std::fs::write(&path, compressed).unwrap();

        let error = BaselineFile::new(&path).load().await.unwrap_err();

        assert!(matches!(error, LoadError::Decode { .. }));
    }

    #[compio::test]
    async fn test_load_rejects_unknown_format_version() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("previous-scan-data");
        let persisted = PersistedBaseline {
            format_version: FORMAT_VERSION + 1,
            entries: sample_entries(),
        };
        let bytes = bincode::encode_to_vec(&persisted, bincode::config::standard()).unwrap();
        std::fs::write(&path, zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL).unwrap()).unwrap();

        let error = BaselineFile::new(&path).load().await.unwrap_err();

        assert!(matches!(error, LoadError::UnsupportedVersion { found } if found == FORMAT_VERSION + 1));
    }

    #[compio::test]
    async fn test_save_into_unwritable_location_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();
        let file = BaselineFile::new(blocker.join("previous-scan-data"));

        let result = file.save(&sample_entries()).await;

        assert!(result.is_err());
    }

    #[test]
    fn test_default_baseline_path_names_baseline_file() {
        let path = default_baseline_path();

        assert_eq!(path.file_name().unwrap(), BASELINE_FILE_NAME);
    }
}
