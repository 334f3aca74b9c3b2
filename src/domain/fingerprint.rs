//! Content fingerprinting
//!
//! A file's identity in the archive is the blake3 hash of its full byte
//! content, hex encoded. Unlike sampled content IDs this reads every byte,
//! which the validator relies on: a re-read that hashes to the same value is
//! taken as proof the archived copy is intact.

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Compute the content fingerprint of a file by streaming it through blake3.
pub async fn fingerprint_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Fingerprint of an in-memory buffer; used by tests and small writes.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_and_buffer_fingerprints_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        let content = b"the same bytes every time";
        tokio::fs::write(&path, content).await.unwrap();

        let from_file = fingerprint_file(&path).await.unwrap();
        assert_eq!(from_file, fingerprint_bytes(content));
        // blake3 hex digest is 32 bytes
        assert_eq!(from_file.len(), 64);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint_file(&dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
