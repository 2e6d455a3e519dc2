//! Splits one byte stream into a hashing consumer and a file writer
//!
//! Both consumers receive every chunk over their own bounded channel, so the
//! archive is hashed and persisted in a single pass without ever being held in
//! memory as a whole. The operation completes when both consumers finish and
//! fails as soon as the source or either consumer fails.

use crate::error::{AcquireError, BoxError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Chunks buffered per consumer before the source waits
const CHANNEL_CAPACITY: usize = 16;

/// Result of a completed tee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeeOutcome {
    /// Lowercase hex SHA-256 of every byte read
    pub hash: String,
    /// Bytes written to the destination file
    pub bytes: u64,
}

/// Drain `source` into `destination` while hashing it.
///
/// `url` only labels download errors. The destination's parent directory must
/// already exist.
pub async fn hash_and_persist<S, E>(
    source: S,
    destination: &Path,
    url: &str,
) -> Result<TeeOutcome, AcquireError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let (hash_tx, hash_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let (file_tx, file_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

    let produce = async move {
        futures::pin_mut!(source);
        while let Some(chunk) = source.next().await {
            let chunk = chunk.map_err(|e| AcquireError::Fetch {
                url: url.to_string(),
                source: e.into(),
            })?;
            // A closed channel means that consumer already failed; its error wins
            if hash_tx.send(chunk.clone()).await.is_err() || file_tx.send(chunk).await.is_err() {
                break;
            }
        }
        Ok::<(), AcquireError>(())
    };

    let (hash, bytes, ()) = tokio::try_join!(
        consume_hash(hash_rx),
        consume_file(file_rx, destination),
        produce
    )?;

    Ok(TeeOutcome { hash, bytes })
}

async fn consume_hash(mut chunks: mpsc::Receiver<Bytes>) -> Result<String, AcquireError> {
    let mut hasher = Sha256::new();
    while let Some(chunk) = chunks.recv().await {
        hasher.update(&chunk);
    }
    Ok(hex::encode(hasher.finalize()))
}

async fn consume_file(
    mut chunks: mpsc::Receiver<Bytes>,
    destination: &Path,
) -> Result<u64, AcquireError> {
    let write_err = |e| AcquireError::write(destination, e);

    let mut file = File::create(destination).await.map_err(write_err)?;
    let mut written = 0u64;
    while let Some(chunk) = chunks.recv().await {
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    Ok(written)
}
