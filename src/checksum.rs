//! Content checksums.
//!
//! Gateways compute checksums on demand with a single fixed algorithm,
//! SHA-256, rendered as lowercase hex. Nothing is persisted.

use futures::{Stream, TryStreamExt};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex digest of an in-memory buffer
pub fn checksum_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hex digest of a file, read in 64KB chunks
pub fn checksum_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex digest of a file, off the async runtime
pub async fn checksum_file_async(path: &Path) -> std::io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || checksum_file(&path))
        .await
        .map_err(std::io::Error::other)?
}

/// Hex digest and length of a chunked byte stream
pub async fn checksum_stream<S, B>(mut stream: S) -> std::io::Result<(String, u64)>
where
    S: Stream<Item = std::io::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    let mut len = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        let chunk = chunk.as_ref();
        hasher.update(chunk);
        len += chunk.len() as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), len))
}
