//! Logical locations used by a scaffolding run
//!
//! Every component asks the [`PathResolver`] for a location instead of
//! building paths itself, so a run can be pointed at temporary directories
//! in tests.

use crate::product::ProductConfig;
use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Named locations a path can be resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Template files rendered into the new project
    Templates,
    /// Per-user configuration (catalog override, templates)
    Config,
    /// Root of the project being created
    Destination,
    /// Source directory of the project being created
    DestinationSrc,
    /// Scratch space for downloaded and unpacked archives
    Temp,
    /// Machine-wide content-addressed artifact cache
    Cache,
    /// Installed packages of the project being created
    NodeModules,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    templates: PathBuf,
    config: PathBuf,
    destination: PathBuf,
    temp: PathBuf,
    cache: PathBuf,
}

impl PathResolver {
    /// Resolver with explicit roots; templates default to `<config>/templates`
    pub fn new(
        destination: impl Into<PathBuf>,
        temp: impl Into<PathBuf>,
        cache: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
    ) -> Self {
        let config = config.into();
        Self {
            templates: config.join("templates"),
            config,
            destination: destination.into(),
            temp: temp.into(),
            cache: cache.into(),
        }
    }

    /// Resolver with the product's default cache and config roots
    pub fn for_product<C: ProductConfig>(
        config: &C,
        destination: impl Into<PathBuf>,
        temp: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::new(
            destination,
            temp,
            default_cache_dir(config)?,
            default_config_dir(config)?,
        ))
    }

    /// Use a different templates directory
    pub fn with_templates(mut self, templates: impl Into<PathBuf>) -> Self {
        self.templates = templates.into();
        self
    }

    /// Absolute root of a location
    pub fn root(&self, location: Location) -> PathBuf {
        match location {
            Location::Templates => self.templates.clone(),
            Location::Config => self.config.clone(),
            Location::Destination => self.destination.clone(),
            Location::DestinationSrc => self.destination.join("src"),
            Location::Temp => self.temp.clone(),
            Location::Cache => self.cache.clone(),
            Location::NodeModules => self.destination.join("node_modules"),
        }
    }

    /// Path of `relative` inside a location
    pub fn get(&self, location: Location, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.as_os_str().is_empty() {
            self.root(location)
        } else {
            self.root(location).join(relative)
        }
    }

    /// Like [`get`](Self::get), but creates the parent directories of the result
    pub fn ensure(&self, location: Location, relative: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = self.get(location, relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }
}

/// Cache root: the product's env override, else `<home>/.{name}-cache`
pub fn default_cache_dir<C: ProductConfig>(config: &C) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(config.cache_dir_env()) {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir().context("Unable to determine home directory")?;
    Ok(home.join(format!(".{}-cache", config.name())))
}

/// Config root: the product's env override, else `<config dir>/{name}`
pub fn default_config_dir<C: ProductConfig>(config: &C) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(config.config_dir_env()) {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .context("Unable to determine configuration directory")?;
    Ok(base.join(config.name()))
}
