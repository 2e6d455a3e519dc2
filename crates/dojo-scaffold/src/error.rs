//! Error types for catalog loading, preconditions and module acquisition
//!
//! Per-module failures (`AcquireError`) never abort a whole run; the
//! orchestrator records them together with the [`Stage`] they happened in.
//! Version disagreements are not errors at all, see
//! [`crate::resolver::ConflictWarning`].

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used where the underlying source type varies (HTTP client, archive readers)
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Problems with the module catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog version '{version}' not found. Available versions: {available}")]
    UnknownVersion { version: String, available: String },

    #[error("Catalog has no versions")]
    Empty,

    #[error("Failed to read catalog {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog")]
    Parse(#[from] serde_yaml::Error),
}

/// Checks that must pass before anything is fetched or written
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("App Name is Required")]
    MissingAppName,

    #[error("Directory is not empty: {0} (use --force to scaffold anyway)")]
    DestinationNotEmpty(PathBuf),

    #[error("Failed to inspect destination {path}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Required tool '{0}' was not found in PATH")]
    MissingTool(String),
}

/// One external step of a module build or project install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    InstallPeers,
    InstallDependencies,
    Pack,
    ProjectInstall,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::InstallPeers => "install peer dependencies",
            BuildStep::InstallDependencies => "install dependencies",
            BuildStep::Pack => "pack",
            BuildStep::ProjectInstall => "project install",
        };
        f.write_str(name)
    }
}

/// Failure while building a module (or installing the generated project)
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to read module manifest {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Failed to start `{program}` for step '{step}'")]
    Spawn {
        step: BuildStep,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Step '{step}' exited with status {}", display_status(.status))]
    StepFailed {
        step: BuildStep,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Pack step did not produce {0}")]
    MissingArtifact(PathBuf),
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "unknown (terminated by signal)".to_string(), |s| s.to_string())
}

/// Stage of the per-module acquisition pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Fetch,
    Unpack,
    Build,
    CacheStore,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Fetch => "fetch",
            Stage::Unpack => "unpack",
            Stage::Build => "build",
            Stage::CacheStore => "cache store",
        };
        f.write_str(name)
    }
}

/// Failure acquiring one git-sourced module
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("'{0}' is not a recognisable git module")]
    NotGitInstallable(String),

    #[error("Failed to download {url}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to unpack {path}")]
    Unpack {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl AcquireError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AcquireError::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unpack(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        AcquireError::Unpack {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Full `cause: cause: ...` chain on one line, for log output
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = StdError::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
