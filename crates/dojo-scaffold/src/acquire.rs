//! Acquisition of git-sourced modules
//!
//! For every resolved module whose version is a git-source specifier the
//! orchestrator runs fetch → cache check → unpack → build → cache store. A
//! failing source is recorded and skipped; the remaining sources still run.
//! Modules that share a specifier are fetched and built once.

use crate::build::ModuleBuilder;
use crate::cache::ArchiveCache;
use crate::catalog::GitInstallableDetails;
use crate::error::{AcquireError, Stage};
use crate::fetch::{unpack, ArchiveFetcher};
use crate::resolver::ResolvedModuleSet;
use crate::runtime::ProcessRunner;
use futures::StreamExt;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const GIT_PREFIX: &str = "github:";

/// Installable artifact for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredArtifact {
    pub details: GitInstallableDetails,
    /// Content hash of the fetched archive (the cache key)
    pub hash: String,
    /// Artifact inside the cache
    pub path: PathBuf,
    /// Served from the cache without building
    pub from_cache: bool,
}

/// A source that could not be acquired, with every module id that needed it
#[derive(Debug)]
pub struct ModuleFailure {
    pub modules: Vec<String>,
    pub specifier: String,
    pub stage: Stage,
    pub error: AcquireError,
}

/// Outcome of [`FetchOrchestrator::acquire_all`]
#[derive(Debug, Default)]
pub struct AcquisitionReport {
    /// Acquired artifacts by module id, in resolution order
    pub artifacts: IndexMap<String, AcquiredArtifact>,
    pub failures: Vec<ModuleFailure>,
    /// Successful builds (cache misses that were built and stored)
    pub builds: usize,
}

impl AcquisitionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of module ids that ended without an artifact
    pub fn failed_modules(&self) -> usize {
        self.failures.iter().map(|f| f.modules.len()).sum()
    }
}

pub struct FetchOrchestrator<F, R> {
    fetcher: F,
    cache: ArchiveCache,
    builder: ModuleBuilder<R>,
    concurrency: usize,
}

impl<F: ArchiveFetcher, R: ProcessRunner> FetchOrchestrator<F, R> {
    pub fn new(fetcher: F, cache: ArchiveCache, builder: ModuleBuilder<R>) -> Self {
        Self {
            fetcher,
            cache,
            builder,
            concurrency: 1,
        }
    }

    /// Sources processed at once; 1 (the default) is strictly sequential
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    /// Acquire every git-sourced module in `modules`
    pub async fn acquire_all(&self, modules: &ResolvedModuleSet) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        let mut sources: IndexMap<GitInstallableDetails, Vec<String>> = IndexMap::new();

        for (id, module) in modules.iter() {
            if let Some(details) = module.installable_details() {
                sources.entry(details).or_default().push(id.to_string());
            } else if module.version.trim().starts_with(GIT_PREFIX) {
                tracing::error!("Module '{}' has an unreadable git source '{}'", id, module.version);
                report.failures.push(ModuleFailure {
                    modules: vec![id.to_string()],
                    specifier: module.version.clone(),
                    stage: Stage::Parse,
                    error: AcquireError::NotGitInstallable(module.version.clone()),
                });
            } else if module.build_from_source {
                tracing::warn!(
                    "Module '{}' is marked buildFromSource but '{}' is not a git source; installing by name",
                    id,
                    module.version
                );
            }
        }

        let total = sources.len();
        if total == 0 {
            return report;
        }
        tracing::info!("Acquiring {} git source(s)", total);
        let finished = AtomicUsize::new(0);

        let results: Vec<_> = futures::stream::iter(sources)
            .map(|(details, ids)| {
                let finished = &finished;
                async move {
                    let result = self.acquire_one(&details).await;
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!("[{}/{}] {}", done, total, details);
                    (details, ids, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (details, ids, result) in results {
            match result {
                Ok(artifact) => {
                    if !artifact.from_cache {
                        report.builds += 1;
                    }
                    for id in ids {
                        report.artifacts.insert(id, artifact.clone());
                    }
                }
                Err((stage, error)) => {
                    tracing::error!("Failed to acquire {} during {}: {}", details, stage, error.chain());
                    report.failures.push(ModuleFailure {
                        modules: ids,
                        specifier: details.to_string(),
                        stage,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "Acquired {} module(s), built {}, {} failure(s)",
            report.artifacts.len(),
            report.builds,
            report.failures.len()
        );
        report
    }

    async fn acquire_one(
        &self,
        details: &GitInstallableDetails,
    ) -> Result<AcquiredArtifact, (Stage, AcquireError)> {
        let fetched = self
            .fetcher
            .fetch_archive(details)
            .await
            .map_err(|e| (Stage::Fetch, e))?;

        if let Some(path) = self.cache.locate(&fetched.hash).await {
            tracing::info!("Using cached build of {} ({})", details, fetched.hash);
            return Ok(AcquiredArtifact {
                details: details.clone(),
                hash: fetched.hash,
                path,
                from_cache: true,
            });
        }

        clear_dir(&fetched.unpack_dir)
            .await
            .map_err(|e| (Stage::Unpack, e))?;
        let files = unpack(&fetched.archive_path, &fetched.unpack_dir, fetched.format)
            .await
            .map_err(|e| (Stage::Unpack, e))?;
        tracing::debug!("Unpacked {} file(s) into {}", files, fetched.unpack_dir.display());

        let built = self
            .builder
            .build(&fetched.unpack_dir)
            .await
            .map_err(|e| (Stage::Build, AcquireError::from(e)))?;

        let path = self
            .cache
            .store(&fetched.hash, &built)
            .await
            .map_err(|e| (Stage::CacheStore, e))?;

        Ok(AcquiredArtifact {
            details: details.clone(),
            hash: fetched.hash,
            path,
            from_cache: false,
        })
    }
}

/// Remove a previous run's unpacked tree so it cannot leak into this build
async fn clear_dir(dir: &Path) -> Result<(), AcquireError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AcquireError::write(dir, e)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::catalog::GitInstallableDetails;
    use crate::error::AcquireError;
    use crate::fetch::{
        hash_and_persist, source_stem, ArchiveFetcher, ArchiveFormat, FetchedArchive,
    };
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Serves in-memory archives; unknown sources fail like a 404
    #[derive(Clone)]
    pub struct FakeFetcher {
        pub temp: PathBuf,
        pub archives: HashMap<GitInstallableDetails, Vec<u8>>,
        pub fetches: Arc<AtomicUsize>,
    }

    impl FakeFetcher {
        pub fn new(temp: impl Into<PathBuf>) -> Self {
            Self {
                temp: temp.into(),
                archives: HashMap::new(),
                fetches: Arc::default(),
            }
        }

        pub fn with_archive(mut self, specifier: &str, archive: Vec<u8>) -> Self {
            let details = GitInstallableDetails::parse(specifier).unwrap();
            self.archives.insert(details, archive);
            self
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl ArchiveFetcher for FakeFetcher {
        async fn fetch_archive(
            &self,
            details: &GitInstallableDetails,
        ) -> Result<FetchedArchive, AcquireError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let archive = self
                .archives
                .get(details)
                .cloned()
                .ok_or_else(|| AcquireError::Fetch {
                    url: details.to_string(),
                    source: "HTTP 404 Not Found".into(),
                })?;

            let owner_dir = self.temp.join(&details.owner);
            tokio::fs::create_dir_all(&owner_dir)
                .await
                .map_err(|e| AcquireError::write(&owner_dir, e))?;
            let stem = source_stem(details);
            let archive_path = owner_dir.join(format!("{stem}.tar.gz"));

            let chunks: Vec<Result<Bytes, std::io::Error>> = archive
                .chunks(64)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            let outcome =
                hash_and_persist(futures::stream::iter(chunks), &archive_path, &details.to_string())
                    .await?;

            Ok(FetchedArchive {
                hash: outcome.hash,
                archive_path,
                unpack_dir: owner_dir.join(stem),
                format: ArchiveFormat::TarGz,
            })
        }
    }
}
