//! Remote archive fetching
//!
//! Archives are downloaded from a codeload-style host:
//! `<base>/<owner>/<repo>/tar.gz/<commit>` (or `/zip/`). The download is
//! streamed through [`tee::hash_and_persist`], which writes it under the temp
//! location while computing the content hash used as the cache key.

pub mod tee;
pub mod unpack;

use crate::catalog::GitInstallableDetails;
use crate::error::AcquireError;
use crate::paths::{Location, PathResolver};
use crate::product::ProductConfig;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use url::Url;

pub use tee::{hash_and_persist, TeeOutcome};
pub use unpack::unpack;

/// Archive flavour served by the archive host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Path segment used in archive URLs
    pub fn url_segment(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// A downloaded archive, hashed and persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    /// Lowercase hex SHA-256 of the archive bytes
    pub hash: String,
    /// Where the raw archive was written
    pub archive_path: PathBuf,
    /// Where the archive should be unpacked
    pub unpack_dir: PathBuf,
    pub format: ArchiveFormat,
}

/// Something that can produce a hashed local copy of a module's source archive
pub trait ArchiveFetcher: Send + Sync {
    fn fetch_archive(
        &self,
        details: &GitInstallableDetails,
    ) -> impl Future<Output = Result<FetchedArchive, AcquireError>> + Send;
}

/// Downloads archives over HTTP
pub struct ContentFetcher {
    client: reqwest::Client,
    base_url: Url,
    format: ArchiveFormat,
    paths: PathResolver,
}

impl ContentFetcher {
    pub fn new(base_url: Url, format: ArchiveFormat, paths: PathResolver, user_agent: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(user_agent)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            format,
            paths,
        }
    }

    /// Create a fetcher from a product config, honouring its base URL override
    pub fn from_config<C: ProductConfig>(config: &C, paths: PathResolver) -> Result<Self> {
        let url_str = std::env::var(config.archive_url_env())
            .unwrap_or_else(|_| config.default_archive_url().to_string());
        let base_url =
            Url::parse(&url_str).with_context(|| format!("Invalid archive URL: {}", url_str))?;
        Ok(Self::new(
            base_url,
            config.archive_format(),
            paths,
            config.user_agent(),
        ))
    }

    /// Canonical archive URL for a source
    pub fn archive_url(&self, details: &GitInstallableDetails) -> Result<Url, AcquireError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AcquireError::Fetch {
                url: self.base_url.to_string(),
                source: "URL cannot have path segments".into(),
            })?
            .pop_if_empty()
            .push(&details.owner)
            .push(&details.repo)
            .push(self.format.url_segment())
            .push(&details.commit);
        Ok(url)
    }

    /// Raw archive location: `<temp>/<owner>/<repo>-<commit>.<ext>`
    pub fn archive_path(&self, details: &GitInstallableDetails) -> PathBuf {
        self.paths.get(
            Location::Temp,
            PathBuf::from(&details.owner).join(format!(
                "{}.{}",
                source_stem(details),
                self.format.extension()
            )),
        )
    }

    /// Unpack location, next to the raw archive
    pub fn unpack_dir(&self, details: &GitInstallableDetails) -> PathBuf {
        self.paths.get(
            Location::Temp,
            PathBuf::from(&details.owner).join(source_stem(details)),
        )
    }
}

/// `{repo}@{slug}`; repo names never contain `@`, so the split is unambiguous
pub(crate) fn source_stem(details: &GitInstallableDetails) -> String {
    format!("{}@{}", details.repo, details.commit_slug())
}

impl ArchiveFetcher for ContentFetcher {
    async fn fetch_archive(
        &self,
        details: &GitInstallableDetails,
    ) -> Result<FetchedArchive, AcquireError> {
        let url = self.archive_url(details)?;
        let archive_path = self.archive_path(details);
        if let Some(parent) = archive_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AcquireError::write(parent, e))?;
        }

        tracing::info!("Downloading {}", url);
        let fetch_err = |source: reqwest::Error| AcquireError::Fetch {
            url: url.to_string(),
            source: source.into(),
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_err)?;

        if !response.status().is_success() {
            return Err(AcquireError::Fetch {
                url: url.to_string(),
                source: format!("HTTP {}", response.status()).into(),
            });
        }

        let chunks = futures::stream::try_unfold(response, |mut response| async move {
            Ok::<_, reqwest::Error>(response.chunk().await?.map(|chunk| (chunk, response)))
        });
        let outcome = hash_and_persist(chunks, &archive_path, url.as_str()).await?;

        tracing::debug!(
            "Downloaded {} ({} bytes, sha256 {})",
            archive_path.display(),
            outcome.bytes,
            outcome.hash
        );

        Ok(FetchedArchive {
            hash: outcome.hash,
            unpack_dir: self.unpack_dir(details),
            archive_path,
            format: self.format,
        })
    }
}
