//! Product configuration trait for CLI binaries
//!
//! Each binary built on this library implements the trait to supply its
//! identity, the embedded default catalog and templates, and the environment
//! variables that override them.

use crate::app::AppConfig;
use crate::fetch::ArchiveFormat;
use std::path::Path;

/// Configuration trait for scaffolding products
pub trait ProductConfig: Clone + Send + Sync + 'static {
    /// Internal product name (used for the cache directory and log file)
    fn name(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// CLI description shown in help text
    fn cli_description(&self) -> &'static str;

    /// Version of the running binary, compared against a catalog's `cliVersion`
    fn cli_version(&self) -> &'static str;

    /// Command to suggest when the CLI is older than the catalog expects
    fn upgrade_command(&self) -> &'static str;

    /// Catalog text compiled into the binary, used when nothing overrides it
    fn default_catalog(&self) -> &'static str;

    /// Environment variable naming a catalog file to use instead of the default
    fn catalog_env(&self) -> &'static str;

    /// Base URL archives are downloaded from
    fn default_archive_url(&self) -> &'static str {
        "https://codeload.github.com"
    }

    /// Environment variable for overriding the archive base URL
    fn archive_url_env(&self) -> &'static str;

    /// Environment variable for overriding the machine-wide cache directory
    fn cache_dir_env(&self) -> &'static str;

    /// Environment variable for overriding the per-user configuration directory
    fn config_dir_env(&self) -> &'static str;

    /// Package manager used to build modules and install the generated project
    fn package_manager(&self) -> &'static str {
        "npm"
    }

    /// Archive flavour requested from the archive host
    fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    /// Template files compiled into the binary, as (relative path, contents)
    fn default_templates(&self) -> &'static [(&'static str, &'static str)];

    /// Generate the "next steps" instructions after project creation
    fn next_steps(&self, dir: &Path, app: &AppConfig) -> Vec<String>;

    /// User agent string for HTTP requests
    fn user_agent(&self) -> &'static str {
        self.name()
    }
}
