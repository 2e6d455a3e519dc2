//! Dependency resolution: expands a module selection into a closed set
//!
//! Resolution starts from the selected catalog modules (in catalog order) and
//! keeps adding peer dependencies until nothing new appears, so peers of
//! peers are included too. Version disagreements never abort: the first
//! version seen wins and every extra conflicting reference is recorded as a
//! [`ConflictWarning`]. Typings are merged the same way.

use crate::catalog::{is_git_installable, CatalogVersion, ModuleCatalog, ModuleDescriptor};
use crate::error::CatalogError;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Dependency-closed mapping from module id to descriptor, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedModuleSet {
    modules: IndexMap<String, ModuleDescriptor>,
}

impl ResolvedModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, descriptor: ModuleDescriptor) {
        self.modules.insert(id.into(), descriptor);
    }

    pub fn get(&self, id: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleDescriptor)> {
        self.modules.iter().map(|(id, module)| (id.as_str(), module))
    }
}

impl FromIterator<(String, ModuleDescriptor)> for ResolvedModuleSet {
    fn from_iter<T: IntoIterator<Item = (String, ModuleDescriptor)>>(iter: T) -> Self {
        Self {
            modules: iter.into_iter().collect(),
        }
    }
}

/// What a conflict was about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    PeerDependency,
    Typings,
    GlobalTypings,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictKind::PeerDependency => "peer dependency",
            ConflictKind::Typings => "typings",
            ConflictKind::GlobalTypings => "global typings",
        };
        f.write_str(name)
    }
}

/// A rejected version request; the first-seen version was kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictWarning {
    pub kind: ConflictKind,
    /// Module or typings package the versions disagree on
    pub id: String,
    /// Module whose declaration was rejected
    pub requested_by: String,
    pub kept: String,
    pub rejected: String,
}

impl fmt::Display for ConflictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' requested at {} by '{}', keeping {}",
            self.kind, self.id, self.rejected, self.requested_by, self.kept
        )
    }
}

/// Counts and warnings produced by one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    /// Selected ids found in the catalog
    pub selected: usize,
    /// Modules pulled in as peer dependencies
    pub added: usize,
    pub conflicts: Vec<ConflictWarning>,
    /// Selected ids the catalog does not know
    pub unknown: Vec<String>,
}

impl ResolutionReport {
    pub fn conflict_count(&self, kind: ConflictKind) -> usize {
        self.conflicts.iter().filter(|c| c.kind == kind).count()
    }
}

/// Output of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub modules: ResolvedModuleSet,
    pub typings: IndexMap<String, String>,
    pub global_typings: IndexMap<String, String>,
    pub report: ResolutionReport,
}

/// Resolve a selection against one catalog version
pub fn resolve(
    catalog: &ModuleCatalog,
    catalog_version: &str,
    selected: &[String],
) -> Result<Resolution, CatalogError> {
    let version = catalog.version(catalog_version)?;
    Ok(resolve_version(version, selected))
}

/// Resolve a selection against an already looked-up catalog version
pub fn resolve_version(catalog: &CatalogVersion, selected: &[String]) -> Resolution {
    let mut report = ResolutionReport::default();

    for id in selected {
        if !catalog.modules.contains_key(id) && !report.unknown.contains(id) {
            tracing::warn!("Unknown module '{}' ignored", id);
            report.unknown.push(id.clone());
        }
    }

    let mut modules: IndexMap<String, ModuleDescriptor> = catalog
        .modules
        .iter()
        .filter(|(id, _)| selected.contains(id))
        .map(|(id, module)| (id.clone(), module.clone()))
        .collect();
    report.selected = modules.len();

    let mut pending: VecDeque<String> = modules.keys().cloned().collect();
    while let Some(id) = pending.pop_front() {
        let peers = match modules.get(&id) {
            Some(module) => module.peer_dependencies.clone(),
            None => continue,
        };

        for (peer_id, peer) in peers {
            if peer_id == id {
                continue;
            }
            match modules.get(&peer_id) {
                None => {
                    let descriptor = match catalog.modules.get(&peer_id) {
                        Some(known) if known.version == peer.version => known.clone(),
                        _ => ModuleDescriptor::with_version(&peer.version),
                    };
                    tracing::debug!("Adding peer dependency {}@{} of {}", peer_id, peer.version, id);
                    modules.insert(peer_id.clone(), descriptor);
                    pending.push_back(peer_id);
                    report.added += 1;
                }
                Some(existing) if is_version_conflict(&existing.version, &peer.version) => {
                    let conflict = ConflictWarning {
                        kind: ConflictKind::PeerDependency,
                        id: peer_id,
                        requested_by: id.clone(),
                        kept: existing.version.clone(),
                        rejected: peer.version,
                    };
                    tracing::warn!("Conflict: {}", conflict);
                    report.conflicts.push(conflict);
                }
                Some(_) => {}
            }
        }
    }

    let modules = ResolvedModuleSet { modules };
    let mut typings = IndexMap::new();
    let mut global_typings = IndexMap::new();
    for (id, module) in modules.iter() {
        merge_typings(
            &mut typings,
            &module.typings,
            ConflictKind::Typings,
            id,
            &mut report.conflicts,
        );
        merge_typings(
            &mut global_typings,
            &module.global_typings,
            ConflictKind::GlobalTypings,
            id,
            &mut report.conflicts,
        );
    }

    tracing::info!(
        "Resolved {} modules ({} selected, {} added, {} conflicts)",
        modules.len(),
        report.selected,
        report.added,
        report.conflicts.len()
    );

    Resolution {
        modules,
        typings,
        global_typings,
        report,
    }
}

/// A git-sourced module already in the set satisfies any plain version request
fn is_version_conflict(existing: &str, requested: &str) -> bool {
    existing != requested && !(is_git_installable(existing) && !is_git_installable(requested))
}

fn merge_typings(
    target: &mut IndexMap<String, String>,
    source: &IndexMap<String, String>,
    kind: ConflictKind,
    module_id: &str,
    conflicts: &mut Vec<ConflictWarning>,
) {
    for (name, version) in source {
        match target.get(name) {
            None => {
                target.insert(name.clone(), version.clone());
            }
            Some(kept) if kept != version => {
                let conflict = ConflictWarning {
                    kind,
                    id: name.clone(),
                    requested_by: module_id.to_string(),
                    kept: kept.clone(),
                    rejected: version.clone(),
                };
                tracing::warn!("Conflict: {}", conflict);
                conflicts.push(conflict);
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn catalog(yaml: &str) -> ModuleCatalog {
        ModuleCatalog::parse(yaml).unwrap()
    }

    const SCENARIO_A: &str = r#"
stable:
  modules:
    core: { version: "1.0.0" }
    widgets:
      version: "1.0.0"
      peerDependencies:
        core: { version: "1.0.0" }
"#;

    #[test]
    fn test_peer_dependency_is_included() {
        let resolution = resolve(&catalog(SCENARIO_A), "stable", &select(&["widgets"])).unwrap();

        assert!(resolution.modules.contains("core"));
        assert!(resolution.modules.contains("widgets"));
        assert_eq!(resolution.modules.len(), 2);
        assert_eq!(resolution.report.added, 1);
        assert!(resolution.report.conflicts.is_empty());
        // Insertion order: selected first, peers appended
        assert_eq!(resolution.modules.ids().collect::<Vec<_>>(), vec!["widgets", "core"]);
    }

    #[test]
    fn test_selected_version_wins_over_peer_request() {
        let yaml = r#"
stable:
  modules:
    core: { version: "1.0.0" }
    widgets:
      version: "1.0.0"
      peerDependencies:
        core: { version: "2.0.0" }
"#;
        let resolution =
            resolve(&catalog(yaml), "stable", &select(&["core", "widgets"])).unwrap();

        assert_eq!(resolution.modules.get("core").unwrap().version, "1.0.0");
        assert_eq!(resolution.report.conflicts.len(), 1);

        let conflict = &resolution.report.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::PeerDependency);
        assert_eq!(conflict.id, "core");
        assert_eq!(conflict.requested_by, "widgets");
        assert_eq!(conflict.kept, "1.0.0");
        assert_eq!(conflict.rejected, "2.0.0");
    }

    #[test]
    fn test_two_modules_disagreeing_on_a_peer() {
        let yaml = r#"
stable:
  modules:
    a:
      version: "1.0.0"
      peerDependencies: { shared: { version: "1.0.0" } }
    b:
      version: "1.0.0"
      peerDependencies: { shared: { version: "2.0.0" } }
    c:
      version: "1.0.0"
      peerDependencies: { shared: { version: "3.0.0" } }
"#;
        let resolution = resolve(&catalog(yaml), "stable", &select(&["a", "b", "c"])).unwrap();

        assert_eq!(resolution.modules.get("shared").unwrap().version, "1.0.0");
        assert_eq!(resolution.report.added, 1);
        assert_eq!(resolution.report.conflict_count(ConflictKind::PeerDependency), 2);
    }

    #[test]
    fn test_peers_of_peers_are_expanded() {
        let yaml = r#"
stable:
  modules:
    app:
      version: "1.0.0"
      peerDependencies: { widgets: { version: "1.0.0" } }
    widgets:
      version: "1.0.0"
      peerDependencies: { core: { version: "1.0.0" } }
    core:
      version: "1.0.0"
      peerDependencies: { has: { version: "0.5.0" } }
"#;
        let resolution = resolve(&catalog(yaml), "stable", &select(&["app"])).unwrap();

        assert_eq!(
            resolution.modules.ids().collect::<Vec<_>>(),
            vec!["app", "widgets", "core", "has"]
        );
        assert_eq!(resolution.report.added, 3);

        // Every peer of every resolved module is itself resolved
        for (_, module) in resolution.modules.iter() {
            for peer in module.peer_dependencies.keys() {
                assert!(resolution.modules.contains(peer));
            }
        }
    }

    #[test]
    fn test_peer_at_other_version_gets_bare_descriptor() {
        let yaml = r#"
stable:
  modules:
    core:
      version: "1.0.0"
      typings: { chai: "3.0.0" }
    widgets:
      version: "1.0.0"
      peerDependencies: { core: { version: "2.0.0" } }
"#;
        let resolution = resolve(&catalog(yaml), "stable", &select(&["widgets"])).unwrap();

        let core = resolution.modules.get("core").unwrap();
        assert_eq!(core, &ModuleDescriptor::with_version("2.0.0"));
        assert!(resolution.typings.is_empty());
    }

    #[test]
    fn test_git_module_satisfies_plain_peer_request() {
        let yaml = r#"
stable:
  modules:
    core: { version: "github:dojo/core#beta" }
    widgets:
      version: "1.0.0"
      peerDependencies: { core: { version: "1.0.0" } }
"#;
        let resolution =
            resolve(&catalog(yaml), "stable", &select(&["core", "widgets"])).unwrap();

        assert!(resolution.report.conflicts.is_empty());
        assert_eq!(resolution.modules.get("core").unwrap().version, "github:dojo/core#beta");
    }

    #[test]
    fn test_plain_module_conflicts_with_git_peer_request() {
        let yaml = r#"
stable:
  modules:
    core: { version: "1.0.0" }
    widgets:
      version: "1.0.0"
      peerDependencies: { core: { version: "github:dojo/core" } }
"#;
        let resolution =
            resolve(&catalog(yaml), "stable", &select(&["core", "widgets"])).unwrap();
        assert_eq!(resolution.report.conflicts.len(), 1);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let resolution =
            resolve(&catalog(SCENARIO_A), "stable", &select(&["core", "nope", "nope"])).unwrap();

        assert_eq!(resolution.modules.len(), 1);
        assert_eq!(resolution.report.unknown, vec!["nope".to_string()]);
        assert_eq!(resolution.report.selected, 1);
    }

    #[test]
    fn test_unknown_catalog_version_is_an_error() {
        let result = resolve(&catalog(SCENARIO_A), "nightly", &select(&["core"]));
        assert!(matches!(result, Err(CatalogError::UnknownVersion { .. })));
    }

    #[test]
    fn test_typings_merge_first_seen_wins() {
        let yaml = r#"
stable:
  modules:
    a:
      version: "1.0.0"
      typings: { chai: "3.4.0", sinon: "1.0.0" }
      globalTypings: { node: "6.0.0" }
    b:
      version: "1.0.0"
      typings: { chai: "4.0.0" }
      globalTypings: { node: "6.0.0", es6-shim: "0.31.2" }
"#;
        let resolution = resolve(&catalog(yaml), "stable", &select(&["a", "b"])).unwrap();

        assert_eq!(resolution.typings["chai"], "3.4.0");
        assert_eq!(resolution.typings["sinon"], "1.0.0");
        assert_eq!(resolution.global_typings["node"], "6.0.0");
        assert_eq!(resolution.global_typings["es6-shim"], "0.31.2");
        assert_eq!(resolution.report.conflict_count(ConflictKind::Typings), 1);
        assert_eq!(resolution.report.conflict_count(ConflictKind::GlobalTypings), 0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let cat = catalog(SCENARIO_A);
        let first = resolve(&cat, "stable", &select(&["widgets", "core"])).unwrap();
        let second = resolve(&cat, "stable", &select(&["widgets", "core"])).unwrap();
        assert_eq!(first, second);
    }
}
