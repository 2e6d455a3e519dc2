//! The `new` and `install` commands, end to end
//!
//! `create_new` checks its preconditions before anything is fetched or
//! written, then resolves the selection, acquires git-sourced modules, renders
//! the templates and installs the project's dependencies. Module failures do
//! not stop the run; they end up in the returned outcome.

use crate::acquire::{AcquiredArtifact, AcquisitionReport, FetchOrchestrator};
use crate::app::AppConfig;
use crate::build::ModuleBuilder;
use crate::cache::ArchiveCache;
use crate::catalog::{GitInstallableDetails, ModuleCatalog, ModuleDescriptor};
use crate::error::{AcquireError, BuildError, CatalogError, PreconditionError};
use crate::fetch::{ArchiveFetcher, ContentFetcher};
use crate::install::install_dependencies;
use crate::paths::{Location, PathResolver};
use crate::product::ProductConfig;
use crate::render::{render_app, TemplateSource};
use crate::resolver::{resolve_version, ResolutionReport, ResolvedModuleSet};
use crate::runtime::{require_tool, ProcessRunner, TokioProcessRunner};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Options of `new`
#[derive(Debug, Clone)]
pub struct NewAppOptions {
    pub name: String,
    pub description: String,
    pub destination: PathBuf,
    /// Catalog version key; the first declared version when unset
    pub catalog_version: Option<String>,
    /// Selected module ids; the catalog's `checked` modules when unset
    pub modules: Option<Vec<String>>,
    pub template_dir: Option<PathBuf>,
    pub force: bool,
    pub skip_git: bool,
    pub skip_render: bool,
    pub skip_npm: bool,
    /// Git sources acquired at once
    pub jobs: usize,
}

impl NewAppOptions {
    pub fn new(name: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            destination: destination.into(),
            catalog_version: None,
            modules: None,
            template_dir: None,
            force: false,
            skip_git: false,
            skip_render: false,
            skip_npm: false,
            jobs: 1,
        }
    }
}

/// What happened to the project install stage
#[derive(Debug)]
pub enum InstallOutcome {
    Skipped,
    Installed,
    Failed(BuildError),
}

#[derive(Debug)]
pub struct NewAppOutcome {
    pub app: AppConfig,
    pub resolution: ResolutionReport,
    pub acquisition: AcquisitionReport,
    /// Rendered files, relative to the destination
    pub rendered: Vec<String>,
    pub install: InstallOutcome,
    /// Non-fatal notices such as catalog compatibility
    pub warnings: Vec<String>,
}

impl NewAppOutcome {
    pub fn is_success(&self) -> bool {
        self.acquisition.is_success() && !matches!(self.install, InstallOutcome::Failed(_))
    }
}

/// Reject an empty application name
pub fn check_app_name(name: &str) -> Result<(), PreconditionError> {
    if name.trim().is_empty() {
        Err(PreconditionError::MissingAppName)
    } else {
        Ok(())
    }
}

/// Reject a non-empty destination unless `force` is set; a missing one is fine
pub fn check_destination(destination: &Path, force: bool) -> Result<(), PreconditionError> {
    match std::fs::read_dir(destination) {
        Ok(mut entries) => {
            if entries.next().is_some() && !force {
                return Err(PreconditionError::DestinationNotEmpty(destination.to_path_buf()));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PreconditionError::Destination {
            path: destination.to_path_buf(),
            source,
        }),
    }
}

/// Scratch directory for one run, removed when dropped
fn temp_dir<C: ProductConfig>(config: &C) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("{}-", config.name()))
        .tempdir()
        .context("Failed to create temporary directory")
}

/// Create a new application with the real archive host and package manager
pub async fn create_new<C: ProductConfig>(
    config: &C,
    catalog: &ModuleCatalog,
    options: &NewAppOptions,
) -> Result<NewAppOutcome> {
    check_app_name(&options.name)?;
    check_destination(&options.destination, options.force)?;
    if !(options.skip_git && options.skip_npm) {
        require_tool(config.package_manager()).await?;
    }

    let temp = temp_dir(config)?;
    let paths = PathResolver::for_product(config, &options.destination, temp.path())?;
    let fetcher = ContentFetcher::from_config(config, paths.clone())?;

    create_new_with(config, catalog, options, &paths, fetcher, TokioProcessRunner).await
}

/// [`create_new`] over explicit paths, fetcher and process runner
pub async fn create_new_with<C, F, R>(
    config: &C,
    catalog: &ModuleCatalog,
    options: &NewAppOptions,
    paths: &PathResolver,
    fetcher: F,
    runner: R,
) -> Result<NewAppOutcome>
where
    C: ProductConfig,
    F: ArchiveFetcher,
    R: ProcessRunner + Clone,
{
    let destination = paths.root(Location::Destination);
    check_app_name(&options.name)?;
    check_destination(&destination, options.force)?;

    let version_key = match &options.catalog_version {
        Some(key) => key.clone(),
        None => catalog
            .default_version()
            .ok_or(CatalogError::Empty)?
            .to_string(),
    };
    let version = catalog.version(&version_key)?;

    let mut warnings = Vec::new();
    if let Some(warning) =
        version.compatibility_warning(config.cli_version(), config.upgrade_command())
    {
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }

    let selected = options
        .modules
        .clone()
        .unwrap_or_else(|| version.default_selection());
    let resolution = resolve_version(version, &selected);
    let app = AppConfig::from_resolution(
        options.name.trim(),
        options.description.as_str(),
        version_key.as_str(),
        &resolution,
    );

    tokio::fs::create_dir_all(&destination)
        .await
        .with_context(|| format!("Failed to create {}", destination.display()))?;

    let acquisition = if options.skip_git {
        tracing::info!("Skipping git module acquisition");
        AcquisitionReport::default()
    } else {
        orchestrator(config, paths, fetcher, runner.clone())
            .with_concurrency(options.jobs)
            .acquire_all(&app.modules)
            .await
    };

    let rendered = if options.skip_render {
        tracing::info!("Skipping template rendering");
        Vec::new()
    } else {
        let source = TemplateSource::for_product(config, options.template_dir.as_deref(), paths);
        render_app(&source, &app, &acquisition.artifacts, paths).await?
    };

    let install = if options.skip_npm {
        InstallOutcome::Skipped
    } else if !destination.join("package.json").is_file() {
        tracing::warn!("No package.json in {}; skipping install", destination.display());
        InstallOutcome::Skipped
    } else {
        match install_dependencies(&runner, config.package_manager(), &destination).await {
            Ok(()) => InstallOutcome::Installed,
            Err(e) => {
                tracing::error!("Project install failed: {}", e);
                InstallOutcome::Failed(e)
            }
        }
    };

    Ok(NewAppOutcome {
        app,
        resolution: resolution.report,
        acquisition,
        rendered,
        install,
        warnings,
    })
}

/// Acquire one git-source installable into the cache
pub async fn install_one<C: ProductConfig>(config: &C, installable: &str) -> Result<AcquiredArtifact> {
    if GitInstallableDetails::parse(installable).is_none() {
        return Err(AcquireError::NotGitInstallable(installable.to_string()).into());
    }
    require_tool(config.package_manager()).await?;

    let temp = temp_dir(config)?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let paths = PathResolver::for_product(config, cwd, temp.path())?;
    let fetcher = ContentFetcher::from_config(config, paths.clone())?;

    install_one_with(config, installable, &paths, fetcher, TokioProcessRunner).await
}

/// [`install_one`] over explicit paths, fetcher and process runner
pub async fn install_one_with<C, F, R>(
    config: &C,
    installable: &str,
    paths: &PathResolver,
    fetcher: F,
    runner: R,
) -> Result<AcquiredArtifact>
where
    C: ProductConfig,
    F: ArchiveFetcher,
    R: ProcessRunner,
{
    let details = GitInstallableDetails::parse(installable)
        .ok_or_else(|| AcquireError::NotGitInstallable(installable.to_string()))?;

    let mut modules = ResolvedModuleSet::new();
    modules.insert(details.repo.clone(), ModuleDescriptor::with_version(installable));

    let mut report = orchestrator(config, paths, fetcher, runner)
        .acquire_all(&modules)
        .await;

    if let Some(failure) = report.failures.pop() {
        return Err(anyhow::Error::new(failure.error)
            .context(format!("Failed to install {} during {}", details, failure.stage)));
    }
    report
        .artifacts
        .swap_remove(&details.repo)
        .with_context(|| format!("No artifact produced for {}", details))
}

fn orchestrator<C, F, R>(
    config: &C,
    paths: &PathResolver,
    fetcher: F,
    runner: R,
) -> FetchOrchestrator<F, R>
where
    C: ProductConfig,
    F: ArchiveFetcher,
    R: ProcessRunner,
{
    FetchOrchestrator::new(
        fetcher,
        ArchiveCache::new(paths.root(Location::Cache)),
        ModuleBuilder::new(runner, config.package_manager()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::testing::FakeFetcher;
    use crate::build::testing::FakeRunner;
    use crate::error::Stage;
    use crate::fetch::unpack::testing::tar_gz_bytes;
    use crate::product::testing::TestProduct;

    const CATALOG: &str = r#"
beta:
  name: Beta modules
  cliVersion: 9.0.0
  modules:
    dojo-core:
      version: "2.0.0"
      checked: true
    dojo-widgets:
      version: "github:dojo/widgets#v1"
      buildFromSource: true
      peerDependencies:
        dojo-core: { version: "2.0.0" }
      typings:
        maquette: "2.1.0"
stable:
  modules:
    dojo-core:
      version: "1.0.0"
"#;

    struct Fixture {
        dir: TempDir,
        paths: PathResolver,
        fetcher: FakeFetcher,
        runner: FakeRunner,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathResolver::new(
            dir.path().join("app"),
            dir.path().join("tmp"),
            dir.path().join("cache"),
            dir.path().join("config"),
        );
        let fetcher = FakeFetcher::new(dir.path().join("tmp")).with_archive(
            "github:dojo/widgets#v1",
            tar_gz_bytes(&[(
                "widgets-v1/package.json",
                r#"{"name": "dojo-widgets", "version": "1.0.0"}"#,
            )]),
        );
        Fixture {
            dir,
            paths,
            fetcher,
            runner: FakeRunner::default(),
        }
    }

    fn catalog() -> ModuleCatalog {
        ModuleCatalog::parse(CATALOG).unwrap()
    }

    #[test]
    fn test_check_app_name() {
        assert!(matches!(check_app_name(""), Err(PreconditionError::MissingAppName)));
        assert!(matches!(check_app_name("   "), Err(PreconditionError::MissingAppName)));
        assert!(check_app_name("my-app").is_ok());
    }

    #[test]
    fn test_check_destination() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_destination(dir.path(), false).is_ok());
        assert!(check_destination(&dir.path().join("missing"), false).is_ok());

        std::fs::write(dir.path().join("existing.txt"), "").unwrap();
        assert!(matches!(
            check_destination(dir.path(), false),
            Err(PreconditionError::DestinationNotEmpty(_))
        ));
        assert!(check_destination(dir.path(), true).is_ok());
    }

    #[tokio::test]
    async fn test_create_new_end_to_end() {
        let f = fixture();
        let mut options = NewAppOptions::new("my-app", f.paths.root(Location::Destination));
        options.catalog_version = Some("beta".to_string());
        options.modules = Some(vec!["dojo-widgets".to_string()]);

        let outcome = create_new_with(
            &TestProduct,
            &catalog(),
            &options,
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.resolution.added, 1);
        assert_eq!(outcome.acquisition.builds, 1);
        assert!(matches!(outcome.install, InstallOutcome::Installed));
        // TestProduct runs 0.1.0 against a catalog asking for 9.0.0
        assert_eq!(outcome.warnings.len(), 1);

        let manifest: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(f.dir.path().join("app/package.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["name"], "my-app");
        assert_eq!(manifest["dependencies"]["dojo-core"], "2.0.0");
        let widgets = manifest["dependencies"]["dojo-widgets"].as_str().unwrap();
        assert!(widgets.starts_with("file:"));
        assert!(widgets.ends_with("dojo-widgets-1.0.0.tgz"));
        assert!(f.dir.path().join("app/typings.json").is_file());

        // Three build steps for the git module, then the project install
        let calls = f.runner.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3].1, vec!["install"]);
        assert_eq!(calls[3].2, f.dir.path().join("app"));
    }

    #[tokio::test]
    async fn test_create_new_skips_stages() {
        let f = fixture();
        let mut options = NewAppOptions::new("my-app", f.paths.root(Location::Destination));
        options.skip_git = true;
        options.skip_npm = true;

        let outcome = create_new_with(
            &TestProduct,
            &catalog(),
            &options,
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap();

        // Defaults: first catalog version, its checked modules
        assert_eq!(outcome.app.catalog_version, "beta");
        assert_eq!(outcome.app.modules.ids().collect::<Vec<_>>(), vec!["dojo-core"]);
        assert!(matches!(outcome.install, InstallOutcome::Skipped));
        assert_eq!(f.fetcher.fetches(), 0);
        assert!(f.runner.calls().is_empty());
        assert_eq!(outcome.rendered, vec!["package.json", "README.md"]);
    }

    #[tokio::test]
    async fn test_create_new_rejects_non_empty_destination() {
        let f = fixture();
        let destination = f.paths.root(Location::Destination);
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("keep.txt"), "").unwrap();
        let options = NewAppOptions::new("my-app", &destination);

        let err = create_new_with(
            &TestProduct,
            &catalog(),
            &options,
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::DestinationNotEmpty(_))
        ));
        assert_eq!(f.fetcher.fetches(), 0);
    }

    #[tokio::test]
    async fn test_create_new_unknown_catalog_version() {
        let f = fixture();
        let mut options = NewAppOptions::new("my-app", f.paths.root(Location::Destination));
        options.catalog_version = Some("nightly".to_string());

        let err = create_new_with(
            &TestProduct,
            &catalog(),
            &options,
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::UnknownVersion { .. })
        ));
    }

    #[tokio::test]
    async fn test_install_one_caches_artifact() {
        let f = fixture();

        let artifact = install_one_with(
            &TestProduct,
            "github:dojo/widgets#v1",
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap();

        assert!(artifact.path.starts_with(f.dir.path().join("cache")));
        assert!(!artifact.from_cache);
    }

    #[tokio::test]
    async fn test_install_one_rejects_plain_versions_and_reports_failures() {
        let f = fixture();

        let err = install_one_with(&TestProduct, "2.0.0", &f.paths, f.fetcher.clone(), f.runner.clone())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AcquireError>(),
            Some(AcquireError::NotGitInstallable(_))
        ));

        let err = install_one_with(
            &TestProduct,
            "github:dojo/missing",
            &f.paths,
            f.fetcher.clone(),
            f.runner.clone(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains(&Stage::Fetch.to_string()));
    }
}
