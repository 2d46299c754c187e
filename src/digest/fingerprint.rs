use std::fmt;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use compio::BufResult;
use compio::fs::File;
use compio::io::AsyncReadAt;
use sha2::{Digest, Sha256};
use snafu::{ResultExt, Snafu};

use crate::scheduler::ShutdownToken;

/// Size of the window used when streaming a file through the hasher.
const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

const FINGERPRINT_LEN: usize = 32;

/// SHA-256 digest of a file's full byte content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Streams the file at `path` through SHA-256.
    ///
    /// The file is read in a single forward pass; at most one chunk is held in
    /// memory. The token is checked between chunks so a shutdown can abandon a
    /// large file part way through.
    pub async fn of_file(path: &Path, token: &ShutdownToken) -> Result<Self, DigestError> {
        let file = File::open(path).await.context(OpenSnafu { path })?;

        let mut hasher = Sha256::new();
        let mut buffer = Vec::with_capacity(DIGEST_CHUNK_SIZE);
        let mut position = 0u64;

        loop {
            if token.is_cancelled() {
                return AbortedSnafu { path }.fail();
            }

            buffer.clear();
            let BufResult(result, returned) = file.read_at(buffer, position).await;
            buffer = returned;

            let read = result.context(ReadSnafu { path })?;
            if read == 0 {
                break;
            }

            hasher.update(&buffer[..read]);
            position += read as u64;
        }

        Ok(Self::from_digest(hasher))
    }

    /// Fingerprint of an in-memory byte slice, identical to the one produced
    /// for a file holding the same bytes.
    #[cfg(test)]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self::from_digest(hasher)
    }

    fn from_digest(hasher: Sha256) -> Self {
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

#[derive(Debug, Snafu)]
pub enum DigestError {
    #[snafu(display("Failed to open '{}' for digesting", path.display()))]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read '{}' while digesting", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Digest of '{}' abandoned due to shutdown", path.display()))]
    Aborted { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_file_with(content: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(content)
            .expect("Failed to write to temp file");
        temp_file.flush().expect("Failed to flush temp file");
        temp_file
    }

    #[compio::test]
    async fn test_fingerprint_of_known_content() {
        let temp_file = temp_file_with(b"abc");

        let fingerprint = Fingerprint::of_file(temp_file.path(), &ShutdownToken::new())
            .await
            .expect("Failed to digest file");

        assert_eq!(
            fingerprint.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[compio::test]
    async fn test_identical_content_at_different_paths_matches() {
        let first = temp_file_with(b"identical content");
        let second = temp_file_with(b"identical content");
        let token = ShutdownToken::new();

        let first_fingerprint = Fingerprint::of_file(first.path(), &token).await.unwrap();
        let second_fingerprint = Fingerprint::of_file(second.path(), &token).await.unwrap();

        assert_eq!(first_fingerprint, second_fingerprint);
    }

    #[compio::test]
    async fn test_single_byte_change_changes_fingerprint() {
        let first = temp_file_with(b"content-a");
        let second = temp_file_with(b"content-b");
        let token = ShutdownToken::new();

        let first_fingerprint = Fingerprint::of_file(first.path(), &token).await.unwrap();
        let second_fingerprint = Fingerprint::of_file(second.path(), &token).await.unwrap();

        assert_ne!(first_fingerprint, second_fingerprint);
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"hello world".as_slice())]
    #[case("special chars: äöü🚀".as_bytes())]
    #[case(&[0u8; DIGEST_CHUNK_SIZE])]
    #[case(&[7u8; DIGEST_CHUNK_SIZE * 3 + 17])]
    #[compio::test]
    async fn test_streamed_digest_matches_in_memory_digest(#[case] content: &[u8]) {
        let temp_file = temp_file_with(content);

        let fingerprint = Fingerprint::of_file(temp_file.path(), &ShutdownToken::new())
            .await
            .expect("Failed to digest file");

        assert_eq!(fingerprint, Fingerprint::of_bytes(content));
    }

    #[compio::test]
    async fn test_nonexistent_file_reports_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("missing.txt");

        let result = Fingerprint::of_file(&missing, &ShutdownToken::new()).await;

        match result {
            Err(DigestError::Open { path, .. }) => assert_eq!(path, missing),
            other => panic!("Expected Open error, got {other:?}"),
        }
    }

    #[compio::test]
    async fn test_cancelled_token_aborts_digest() {
        let temp_file = temp_file_with(b"some content");
        let token = ShutdownToken::new();
        token.cancel();

        let result = Fingerprint::of_file(temp_file.path(), &token).await;

        assert!(matches!(result, Err(DigestError::Aborted { .. })));
    }

    #[test]
    fn test_digest_error_display() {
        let error = DigestError::Read {
            path: PathBuf::from("/var/log/app.log"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        let message = error.to_string();

        assert!(message.contains("Failed to read"));
        assert!(message.contains("/var/log/app.log"));
    }
}
