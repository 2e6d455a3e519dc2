//! Module catalog: versioned sets of installable modules
//!
//! The catalog is loaded once at startup and never mutated. It is a YAML
//! document (JSON works too) keyed by catalog version:
//!
//! ```yaml
//! stable:
//!   name: Stable modules
//!   cliVersion: 0.1.0
//!   modules:
//!     dojo-core:
//!       version: "github:dojo/core#master"
//!       buildFromSource: true
//!       peerDependencies:
//!         dojo-has: { version: "2.0.0-alpha.4" }
//! ```

pub mod descriptor;
pub mod git;
pub mod version;

use crate::error::CatalogError;
use crate::product::ProductConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use descriptor::{ModuleDescriptor, PeerDependency};
pub use git::{is_git_installable, GitInstallableDetails, DEFAULT_COMMIT};
pub use version::CliRequirement;

/// Modules available under one catalog version key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersion {
    /// Display name of this configuration
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// CLI this configuration was written for: a minimum version or a semver range
    #[serde(default)]
    pub cli_version: Option<String>,

    pub modules: IndexMap<String, ModuleDescriptor>,
}

impl CatalogVersion {
    /// Modules marked `checked`, in declaration order
    pub fn default_selection(&self) -> Vec<String> {
        self.modules
            .iter()
            .filter(|(_, module)| module.checked)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// All catalog versions, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleCatalog {
    versions: IndexMap<String, CatalogVersion>,
}

impl ModuleCatalog {
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_yaml::from_str(content)?;
        if catalog.versions.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load the catalog for a product.
    ///
    /// Precedence: explicit path, then the product's env var, then
    /// `catalog.yaml` in the config directory, then the embedded default.
    pub fn for_product<C: ProductConfig>(
        config: &C,
        explicit: Option<&Path>,
        config_dir: &Path,
    ) -> Result<Self, CatalogError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(config.catalog_env()) {
            return Self::load(&PathBuf::from(path));
        }
        let user_catalog = config_dir.join("catalog.yaml");
        if user_catalog.is_file() {
            tracing::debug!("Using catalog from {}", user_catalog.display());
            return Self::load(&user_catalog);
        }
        Self::parse(config.default_catalog())
    }

    pub fn version(&self, key: &str) -> Result<&CatalogVersion, CatalogError> {
        self.versions
            .get(key)
            .ok_or_else(|| CatalogError::UnknownVersion {
                version: key.to_string(),
                available: self.version_keys().join(", "),
            })
    }

    /// First declared version key
    pub fn default_version(&self) -> Option<&str> {
        self.versions.keys().next().map(String::as_str)
    }

    pub fn version_keys(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }

    pub fn versions(&self) -> impl Iterator<Item = (&str, &CatalogVersion)> {
        self.versions.iter().map(|(key, version)| (key.as_str(), version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::testing::TestProduct;

    const CATALOG: &str = r#"
stable:
  name: Stable
  cliVersion: 0.1.0
  modules:
    core:
      version: "1.0.0"
      checked: true
    widgets:
      version: "github:acme/widgets"
      peerDependencies:
        core: { version: "1.0.0" }
latest:
  modules:
    core:
      version: "2.0.0"
"#;

    #[test]
    fn test_versions_keep_declaration_order() {
        let catalog = ModuleCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.version_keys(), vec!["stable", "latest"]);
        assert_eq!(catalog.default_version(), Some("stable"));

        let stable = catalog.version("stable").unwrap();
        let ids: Vec<_> = stable.modules.keys().collect();
        assert_eq!(ids, vec!["core", "widgets"]);
        assert_eq!(stable.cli_version.as_deref(), Some("0.1.0"));
    }

    #[test]
    fn test_json_catalog_is_accepted() {
        let json = r#"{"stable": {"modules": {"core": {"version": "1.0.0"}}}}"#;
        let catalog = ModuleCatalog::parse(json).unwrap();
        assert_eq!(catalog.version("stable").unwrap().modules["core"].version, "1.0.0");
    }

    #[test]
    fn test_unknown_version_lists_available() {
        let catalog = ModuleCatalog::parse(CATALOG).unwrap();
        let err = catalog.version("nightly").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownVersion { .. }));
        assert!(err.to_string().contains("stable, latest"));
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        assert!(matches!(ModuleCatalog::parse("{}"), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_default_selection_uses_checked_modules() {
        let catalog = ModuleCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.version("stable").unwrap().default_selection(), vec!["core"]);
    }

    #[test]
    fn test_for_product_prefers_explicit_then_config_dir() {
        let dir = tempfile::tempdir().unwrap();

        // Nothing on disk: embedded default
        let catalog = ModuleCatalog::for_product(&TestProduct, None, dir.path()).unwrap();
        assert_eq!(catalog.version_keys(), vec!["stable"]);

        // catalog.yaml in the config directory wins over the default
        std::fs::write(dir.path().join("catalog.yaml"), CATALOG).unwrap();
        let catalog = ModuleCatalog::for_product(&TestProduct, None, dir.path()).unwrap();
        assert_eq!(catalog.version_keys(), vec!["stable", "latest"]);

        // An explicit file wins over both
        let explicit = dir.path().join("other.yaml");
        std::fs::write(&explicit, "beta:\n  modules: {}\n").unwrap();
        let catalog =
            ModuleCatalog::for_product(&TestProduct, Some(&explicit), dir.path()).unwrap();
        assert_eq!(catalog.version_keys(), vec!["beta"]);
    }
}
