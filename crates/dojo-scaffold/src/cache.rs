//! Machine-wide content-addressed artifact cache
//!
//! Entries are keyed by the SHA-256 of the fetched archive (not of the built
//! artifact), so identical upstream content always maps to the same slot even
//! when builds are not reproducible. Layout:
//!
//! ```text
//! ~/.{name}-cache/
//! ├── <hash>/
//! │   └── <name>-<version>.tgz
//! └── {name}.log
//! ```
//!
//! Entries are written once and never modified. `store` stages the artifact
//! in a private directory and renames it into place, so readers never observe
//! a half-written entry. Two processes racing on one hash is harmless: the
//! loser discards its copy and uses the winner's.

use crate::error::AcquireError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One cached artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: String,
    pub artifact: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct ArchiveCache {
    root: PathBuf,
}

impl ArchiveCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, hash: &str) -> Option<PathBuf> {
        is_valid_hash(hash).then(|| self.root.join(hash))
    }

    /// Artifact stored for `hash`, if any
    pub async fn locate(&self, hash: &str) -> Option<PathBuf> {
        let dir = self.entry_dir(hash)?;
        first_file(&dir).await.ok().flatten()
    }

    pub async fn has(&self, hash: &str) -> bool {
        self.locate(hash).await.is_some()
    }

    /// Copy `artifact` into the entry for `hash` and return the cached path.
    ///
    /// An existing entry is never overwritten; its artifact is returned instead.
    pub async fn store(&self, hash: &str, artifact: &Path) -> Result<PathBuf, AcquireError> {
        let invalid_key = || {
            AcquireError::write(
                self.root.join(hash),
                io::Error::new(io::ErrorKind::InvalidInput, "cache key is not a hex digest"),
            )
        };
        let entry_dir = self.entry_dir(hash).ok_or_else(invalid_key)?;
        let file_name = artifact.file_name().ok_or_else(|| {
            AcquireError::write(
                artifact,
                io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"),
            )
        })?;

        if let Some(existing) = self.locate(hash).await {
            return Ok(existing);
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AcquireError::write(&self.root, e))?;

        // Dropped (and removed) on every path except a successful rename
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)
            .map_err(|e| AcquireError::write(&self.root, e))?;
        let staged = staging.path().join(file_name);
        fs::copy(artifact, &staged)
            .await
            .map_err(|e| AcquireError::write(&staged, e))?;

        match fs::rename(staging.path(), &entry_dir).await {
            Ok(()) => {
                tracing::debug!("Cached {} as {}", artifact.display(), hash);
                Ok(entry_dir.join(file_name))
            }
            Err(e) => match self.locate(hash).await {
                Some(existing) => {
                    tracing::debug!("Cache entry {} was stored concurrently", hash);
                    Ok(existing)
                }
                None => Err(AcquireError::write(&entry_dir, e)),
            },
        }
    }

    /// All complete entries
    pub async fn entries(&self) -> io::Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e),
        };

        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if !is_valid_hash(&name) || !item.file_type().await?.is_dir() {
                continue;
            }
            if let Some(artifact) = first_file(&item.path()).await? {
                let size = fs::metadata(&artifact).await?.len();
                entries.push(CacheEntry {
                    hash: name,
                    artifact,
                    size,
                });
            }
        }

        entries.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(entries)
    }

    /// Remove every entry (and leftover staging directories); returns how many entries went
    pub async fn clear(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            if !item.file_type().await?.is_dir() {
                continue;
            }
            if is_valid_hash(&name) {
                fs::remove_dir_all(item.path()).await?;
                removed += 1;
            } else if name.starts_with(".staging-") {
                fs::remove_dir_all(item.path()).await?;
            }
        }

        Ok(removed)
    }
}

fn is_valid_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

async fn first_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
