//! Rendering of template files into the new project
//!
//! Templates come from a directory on disk or from the set compiled into the
//! binary. `{{name}}` and `{{description}}` are substituted, a leading `_` is
//! dropped from file names (`_package.json` → `package.json`), and the
//! generated `package.json` receives the resolved modules as dependencies.

use crate::acquire::AcquiredArtifact;
use crate::app::AppConfig;
use crate::paths::{Location, PathResolver};
use crate::product::ProductConfig;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const PACKAGE_JSON: &str = "package.json";
const TYPINGS_JSON: &str = "typings.json";

/// Where template files are read from
#[derive(Debug, Clone)]
pub enum TemplateSource {
    Directory(PathBuf),
    Embedded(&'static [(&'static str, &'static str)]),
}

impl TemplateSource {
    /// `explicit` directory, else the templates location if it exists, else the embedded set
    pub fn for_product<C: ProductConfig>(
        config: &C,
        explicit: Option<&Path>,
        paths: &PathResolver,
    ) -> Self {
        if let Some(dir) = explicit {
            return TemplateSource::Directory(dir.to_path_buf());
        }
        let configured = paths.root(Location::Templates);
        if configured.is_dir() {
            TemplateSource::Directory(configured)
        } else {
            TemplateSource::Embedded(config.default_templates())
        }
    }

    /// All template files as (relative path with `/` separators, contents)
    pub async fn files(&self) -> Result<Vec<(String, String)>> {
        match self {
            TemplateSource::Embedded(files) => Ok(files
                .iter()
                .map(|(path, contents)| (path.to_string(), contents.to_string()))
                .collect()),
            TemplateSource::Directory(root) => {
                let mut files = Vec::new();
                for entry in WalkDir::new(root).sort_by_file_name() {
                    let entry = entry
                        .with_context(|| format!("Failed to read templates in {}", root.display()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let relative = entry
                        .path()
                        .strip_prefix(root)
                        .context("Template outside its directory")?
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    let contents = fs::read_to_string(entry.path())
                        .await
                        .with_context(|| format!("Failed to read template {}", entry.path().display()))?;
                    files.push((relative, contents));
                }
                Ok(files)
            }
        }
    }
}

/// Render every template into the destination, returning the written paths (relative)
pub async fn render_app(
    source: &TemplateSource,
    app: &AppConfig,
    artifacts: &IndexMap<String, AcquiredArtifact>,
    paths: &PathResolver,
) -> Result<Vec<String>> {
    let mut written = Vec::new();
    let mut has_manifest = false;

    for (template, contents) in source.files().await? {
        let output = output_name(&template);
        let is_json = output.ends_with(".json");
        let mut rendered = substitute(&contents, app, is_json);

        if output == PACKAGE_JSON {
            has_manifest = true;
            rendered = with_dependencies(&rendered, app, artifacts)
                .with_context(|| format!("Template {} is not valid JSON", template))?;
        }

        write_file(paths, &output, &rendered).await?;
        tracing::debug!("Rendered {} from {}", output, template);
        written.push(output);
    }

    if !has_manifest {
        let base = json!({ "name": app.name, "description": app.description }).to_string();
        write_file(paths, PACKAGE_JSON, &with_dependencies(&base, app, artifacts)?).await?;
        written.push(PACKAGE_JSON.to_string());
    }

    if !app.typings.is_empty() || !app.global_typings.is_empty() {
        let typings = json!({
            "dependencies": app.typings,
            "globalDependencies": app.global_typings,
        });
        write_file(paths, TYPINGS_JSON, &pretty(&typings)?).await?;
        written.push(TYPINGS_JSON.to_string());
    }

    tracing::info!("Rendered {} file(s)", written.len());
    Ok(written)
}

/// Dependency value for every module: the cached artifact when acquired, else its version
pub fn dependency_map(
    app: &AppConfig,
    artifacts: &IndexMap<String, AcquiredArtifact>,
) -> IndexMap<String, String> {
    app.modules
        .iter()
        .map(|(id, module)| {
            let value = match artifacts.get(id) {
                Some(artifact) => format!("file:{}", artifact.path.display()),
                None => module.version.clone(),
            };
            (id.to_string(), value)
        })
        .collect()
}

fn output_name(template: &str) -> String {
    match template.rsplit_once('/') {
        Some((dir, file)) => format!("{}/{}", dir, file.strip_prefix('_').unwrap_or(file)),
        None => template.strip_prefix('_').unwrap_or(template).to_string(),
    }
}

fn substitute(contents: &str, app: &AppConfig, is_json: bool) -> String {
    let value = |raw: &str| {
        if is_json {
            // Quoted JSON string without the surrounding quotes
            let quoted = Value::String(raw.to_string()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        } else {
            raw.to_string()
        }
    };
    contents
        .replace("{{name}}", &value(&app.name))
        .replace("{{description}}", &value(&app.description))
}

fn with_dependencies(
    manifest: &str,
    app: &AppConfig,
    artifacts: &IndexMap<String, AcquiredArtifact>,
) -> Result<String> {
    let mut manifest: Value = serde_json::from_str(manifest)?;
    let root = manifest
        .as_object_mut()
        .context("package.json must be a JSON object")?;

    let dependencies = root
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    let dependencies = dependencies
        .as_object_mut()
        .context("package.json dependencies must be an object")?;
    for (id, value) in dependency_map(app, artifacts) {
        dependencies.insert(id, Value::String(value));
    }

    pretty(&manifest)
}

fn pretty(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

async fn write_file(paths: &PathResolver, relative: &str, contents: &str) -> Result<()> {
    let target = paths
        .ensure(Location::Destination, relative)
        .with_context(|| format!("Failed to create directory for {}", relative))?;
    fs::write(&target, contents)
        .await
        .with_context(|| format!("Failed to write file: {}", target.display()))
}
