//! Builds an unpacked module source tree into an installable artifact
//!
//! Three package-manager invocations run strictly in order inside the source
//! tree: install the module's declared peer dependencies, install its own
//! dependencies, pack. Any non-zero exit fails the whole build.

use crate::error::{BoxError, BuildError, BuildStep};
use crate::runtime::ProcessRunner;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Fields of `package.json` the build needs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub peer_dependencies: IndexMap<String, String>,
}

impl PackageManifest {
    pub async fn read(source: &Path) -> Result<Self, BuildError> {
        let path = source.join("package.json");
        let manifest_err = |e: BoxError| BuildError::Manifest {
            path: path.clone(),
            source: e,
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| manifest_err(e.into()))?;
        serde_json::from_str(&content).map_err(|e| manifest_err(e.into()))
    }

    /// File name `pack` produces: scoped `@scope/name` becomes `scope-name`
    pub fn artifact_name(&self, extension: &str) -> String {
        let name = self.name.trim_start_matches('@').replace('/', "-");
        format!("{}-{}.{}", name, self.version, extension)
    }
}

pub struct ModuleBuilder<R> {
    runner: R,
    package_manager: String,
    artifact_extension: String,
}

impl<R: ProcessRunner> ModuleBuilder<R> {
    pub fn new(runner: R, package_manager: impl Into<String>) -> Self {
        Self {
            runner,
            package_manager: package_manager.into(),
            artifact_extension: "tgz".to_string(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build the module at `source` and return `<source>/<name>-<version>.tgz`
    pub async fn build(&self, source: &Path) -> Result<PathBuf, BuildError> {
        let manifest = PackageManifest::read(source).await?;
        tracing::info!("Building {}@{}", manifest.name, manifest.version);

        let mut peer_args = vec!["-s".to_string(), "install".to_string()];
        peer_args.extend(
            manifest
                .peer_dependencies
                .iter()
                .map(|(name, version)| format!("{}@{}", name, version)),
        );

        self.step(BuildStep::InstallPeers, &peer_args, source).await?;
        self.step(BuildStep::InstallDependencies, &args(&["-s", "install"]), source)
            .await?;
        self.step(BuildStep::Pack, &args(&["-s", "pack"]), source).await?;

        let artifact = source.join(manifest.artifact_name(&self.artifact_extension));
        match tokio::fs::try_exists(&artifact).await {
            Ok(true) => Ok(artifact),
            _ => Err(BuildError::MissingArtifact(artifact)),
        }
    }

    async fn step(&self, step: BuildStep, args: &[String], cwd: &Path) -> Result<(), BuildError> {
        run_step(&self.runner, &self.package_manager, step, args, cwd).await
    }
}

/// Run one package-manager step, turning spawn failures and non-zero exits into [`BuildError`]
pub(crate) async fn run_step<R: ProcessRunner>(
    runner: &R,
    program: &str,
    step: BuildStep,
    args: &[String],
    cwd: &Path,
) -> Result<(), BuildError> {
    let output = runner
        .run(program, args, cwd)
        .await
        .map_err(|source| BuildError::Spawn {
            step,
            program: program.to_string(),
            source,
        })?;

    if output.success() {
        Ok(())
    } else {
        tracing::debug!("{} failed:\n{}", step, output.stderr);
        Err(BuildError::StepFailed {
            step,
            status: output.status,
            stderr: output.stderr,
        })
    }
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
