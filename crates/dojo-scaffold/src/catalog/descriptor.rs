//! Module descriptors as declared in the catalog

use super::git::{is_git_installable, GitInstallableDetails};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Version requirement on another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDependency {
    pub version: String,
}

/// One installable module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    /// Registry version or git-source specifier
    pub version: String,

    /// Whether the module must be built from its git source
    #[serde(default, skip_serializing_if = "is_false")]
    pub build_from_source: bool,

    /// Modules required alongside this one
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub peer_dependencies: IndexMap<String, PeerDependency>,

    /// Type-declaration packages and their versions
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub typings: IndexMap<String, String>,

    /// Global type-declaration packages and their versions
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub global_typings: IndexMap<String, String>,

    /// Selected by default when the user names no modules
    #[serde(default, skip_serializing_if = "is_false")]
    pub checked: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ModuleDescriptor {
    /// Descriptor carrying nothing but a version
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            build_from_source: false,
            peer_dependencies: IndexMap::new(),
            typings: IndexMap::new(),
            global_typings: IndexMap::new(),
            checked: false,
        }
    }

    pub fn is_git_installable(&self) -> bool {
        is_git_installable(&self.version)
    }

    pub fn installable_details(&self) -> Option<GitInstallableDetails> {
        GitInstallableDetails::parse(&self.version)
    }
}
