//! Description of the application being generated

use crate::resolver::{Resolution, ResolvedModuleSet};
use indexmap::IndexMap;
use serde::Serialize;

/// Everything the render stage needs to know about the new application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub name: String,
    pub description: String,
    /// Catalog version the modules were resolved against
    pub catalog_version: String,
    pub modules: ResolvedModuleSet,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub typings: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub global_typings: IndexMap<String, String>,
}

impl AppConfig {
    pub fn from_resolution(
        name: impl Into<String>,
        description: impl Into<String>,
        catalog_version: impl Into<String>,
        resolution: &Resolution,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            catalog_version: catalog_version.into(),
            modules: resolution.modules.clone(),
            typings: resolution.typings.clone(),
            global_typings: resolution.global_typings.clone(),
        }
    }
}
