//! Dojo Scaffold - module resolution, fetching and project scaffolding
//!
//! This library implements everything behind the `dojo` CLI except argument
//! parsing. A binary supplies its identity and defaults through the
//! [`ProductConfig`] trait and drives the [`workflow`] functions.
//!
//! # Architecture
//!
//! - **Catalog and resolution** - [`catalog`] loads versioned module sets,
//!   [`resolver`] expands a selection into a dependency-closed set
//! - **Acquisition** - [`fetch`] downloads and hashes source archives,
//!   [`cache`] stores built artifacts by content hash, [`build`] turns a
//!   source tree into an artifact, [`acquire`] runs the per-module pipeline
//! - **Project output** - [`render`] writes templates, [`install`] installs
//!   the generated project's dependencies
//!
//! # Example Usage
//!
//! ```ignore
//! use dojo_scaffold::{workflow, ModuleCatalog, NewAppOptions};
//!
//! let catalog = ModuleCatalog::parse(config.default_catalog())?;
//! let options = NewAppOptions::new("my-app", std::env::current_dir()?);
//! let outcome = workflow::create_new(&config, &catalog, &options).await?;
//! ```

pub mod acquire;
pub mod app;
pub mod build;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod fetch;
pub mod install;
pub mod logging;
pub mod paths;
pub mod product;
pub mod render;
pub mod resolver;
pub mod runtime;
pub mod workflow;

// Re-export main types for convenience
pub use acquire::{AcquiredArtifact, AcquisitionReport, FetchOrchestrator, ModuleFailure};
pub use app::AppConfig;
pub use build::ModuleBuilder;
pub use cache::{ArchiveCache, CacheEntry};
pub use catalog::{GitInstallableDetails, ModuleCatalog, ModuleDescriptor};
pub use error::{AcquireError, BuildError, CatalogError, PreconditionError, Stage};
pub use fetch::{ArchiveFetcher, ArchiveFormat, ContentFetcher};
pub use paths::{Location, PathResolver};
pub use product::ProductConfig;
pub use resolver::{resolve, ConflictWarning, Resolution, ResolvedModuleSet};
pub use runtime::{ProcessRunner, TokioProcessRunner};
pub use workflow::{InstallOutcome, NewAppOptions, NewAppOutcome};
