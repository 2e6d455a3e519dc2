//! Dojo CLI - scaffolding for Dojo applications

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use dojo_scaffold::paths::{default_cache_dir, default_config_dir};
use dojo_scaffold::workflow::{self, InstallOutcome, NewAppOptions, NewAppOutcome};
use dojo_scaffold::{
    logging, AcquisitionReport, AppConfig, ArchiveCache, ModuleCatalog, ProductConfig,
};
use std::path::{Path, PathBuf};

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_CATALOG: &str = include_str!("../config/catalog.yaml");

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("_package.json", include_str!("../templates/_package.json")),
    ("_tsconfig.json", include_str!("../templates/_tsconfig.json")),
    ("README.md", include_str!("../templates/README.md")),
    ("src/main.ts", include_str!("../templates/src/main.ts")),
];

/// Dojo product configuration
#[derive(Clone)]
pub struct DojoConfig;

impl ProductConfig for DojoConfig {
    fn name(&self) -> &'static str {
        "dojo-cli"
    }

    fn display_name(&self) -> &'static str {
        "Dojo"
    }

    fn cli_description(&self) -> &'static str {
        "CLI for scaffolding Dojo applications"
    }

    fn cli_version(&self) -> &'static str {
        CLI_VERSION
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install dojo-cli --force"
    }

    fn default_catalog(&self) -> &'static str {
        DEFAULT_CATALOG
    }

    fn catalog_env(&self) -> &'static str {
        "DOJO_CATALOG"
    }

    fn archive_url_env(&self) -> &'static str {
        "DOJO_ARCHIVE_URL"
    }

    fn cache_dir_env(&self) -> &'static str {
        "DOJO_CACHE_DIR"
    }

    fn config_dir_env(&self) -> &'static str {
        "DOJO_CONFIG_DIR"
    }

    fn default_templates(&self) -> &'static [(&'static str, &'static str)] {
        DEFAULT_TEMPLATES
    }

    fn next_steps(&self, dir: &Path, app: &AppConfig) -> Vec<String> {
        let mut steps = Vec::new();
        let current = std::env::current_dir().ok();

        if current.as_deref() != Some(dir) {
            steps.push(format!("cd {}", dir.display()));
        }
        if !dir.join("node_modules").exists() {
            steps.push(format!("{} install", self.package_manager()));
        }
        steps.push(format!("{} run build to compile {}", self.package_manager(), app.name));

        steps
    }
}

#[derive(Parser, Debug)]
#[command(name = "dojo")]
#[command(about = "CLI for scaffolding Dojo applications")]
#[command(version)]
pub struct Args {
    /// Echo diagnostic logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new Dojo application
    New(NewArgs),
    /// Build a git-sourced module into the local cache
    Install(InstallArgs),
    /// Show catalog versions and their modules
    List(ListArgs),
    /// Inspect or clear the artifact cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(ClapArgs, Debug)]
pub struct CatalogArgs {
    /// Catalog file to use instead of the configured one
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Catalog version to use (defaults to the first one declared)
    #[arg(long = "catalog-version")]
    pub catalog_version: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct NewArgs {
    /// Name of the application
    pub app_name: Option<String>,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Modules to include (comma-separated); defaults to the catalog's preselected modules
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Option<Vec<String>>,

    /// Description written into package.json
    #[arg(long, default_value = "")]
    pub description: String,

    /// Directory to create the application in (defaults to the current directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Local directory to use for templates instead of the built-in ones
    #[arg(long = "template-dir")]
    pub template_dir: Option<PathBuf>,

    /// Force usage in a non-empty directory
    #[arg(short, long)]
    pub force: bool,

    /// Skip the final package install
    #[arg(long = "skip-npm")]
    pub skip_npm: bool,

    /// Skip fetching and building git-sourced modules
    #[arg(long = "skip-git", alias = "skip-github")]
    pub skip_git: bool,

    /// Skip rendering template files
    #[arg(long = "skip-render")]
    pub skip_render: bool,

    /// Number of git modules to acquire at once
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,
}

#[derive(ClapArgs, Debug)]
pub struct InstallArgs {
    /// Git source specifier, e.g. github:dojo/core#master
    pub installable: String,
}

#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache directory
    Dir,
    /// List cached artifacts
    List,
    /// Remove every cached artifact
    Clean,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = DojoConfig;

    let log_file = default_cache_dir(&config)
        .ok()
        .map(|dir| dir.join(format!("{}.log", config.name())));
    logging::init(args.verbose, log_file.as_deref());

    match run(&config, args.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            std::process::exit(1);
        }
    }
}

/// Run one command; `Ok(false)` means it finished but something failed along the way
async fn run(config: &DojoConfig, command: Command) -> Result<bool> {
    match command {
        Command::New(args) => new_app(config, args).await,
        Command::Install(args) => install(config, &args.installable).await,
        Command::List(args) => list(config, &args.catalog),
        Command::Cache { action } => cache(config, action).await,
    }
}

fn load_catalog(config: &DojoConfig, args: &CatalogArgs) -> Result<ModuleCatalog> {
    let config_dir = default_config_dir(config)?;
    ModuleCatalog::for_product(config, args.catalog.as_deref(), &config_dir)
        .context("Failed to load module catalog")
}

async fn new_app(config: &DojoConfig, args: NewArgs) -> Result<bool> {
    let destination = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let catalog = load_catalog(config, &args.catalog)?;

    let mut options = NewAppOptions::new(args.app_name.unwrap_or_default(), &destination);
    options.description = args.description;
    options.catalog_version = args.catalog.catalog_version;
    options.modules = args.modules;
    options.template_dir = args.template_dir;
    options.force = args.force;
    options.skip_git = args.skip_git;
    options.skip_render = args.skip_render;
    options.skip_npm = args.skip_npm;
    options.jobs = args.jobs;

    println!(
        "{}",
        format!("Creating {} application {}", config.display_name(), options.name)
            .cyan()
            .bold()
    );

    let outcome = workflow::create_new(config, &catalog, &options).await?;
    report(config, &destination, &outcome);
    Ok(outcome.is_success())
}

fn report(config: &DojoConfig, destination: &Path, outcome: &NewAppOutcome) {
    for warning in &outcome.warnings {
        eprintln!("{} {}", "Warning:".yellow(), warning);
    }
    for id in &outcome.resolution.unknown {
        eprintln!("{} Unknown module '{}' ignored", "Warning:".yellow(), id);
    }
    for conflict in &outcome.resolution.conflicts {
        eprintln!("{} {}", "Warning:".yellow(), conflict);
    }

    for (id, artifact) in &outcome.acquisition.artifacts {
        let how = if artifact.from_cache { "cached" } else { "built" };
        println!("  {} {} ({})", "->".blue(), id, how.green());
    }
    for failure in &outcome.acquisition.failures {
        eprintln!(
            "{} {} ({}) failed during {}: {}",
            "Error:".red(),
            failure.modules.join(", "),
            failure.specifier,
            failure.stage,
            failure.error.chain()
        );
    }

    match &outcome.install {
        InstallOutcome::Installed => println!("  {} dependencies installed", "->".blue()),
        InstallOutcome::Failed(e) => eprintln!("{} {}", "Error:".red(), e),
        InstallOutcome::Skipped => {}
    }

    if outcome.is_success() {
        println!();
        println!(
            "{} {} with {} module(s) in {}",
            "Created".green().bold(),
            outcome.app.name,
            outcome.app.modules.len(),
            destination.display()
        );
        println!();
        println!("Next steps:");
        for step in config.next_steps(destination, &outcome.app) {
            println!("  {}", step);
        }
    } else {
        eprintln!();
        for line in failure_summary(&outcome.acquisition, &outcome.install) {
            eprintln!("{} {}", "Failed:".red().bold(), line);
        }
    }
}

/// One summary line per kind of failure that ended the run
fn failure_summary(acquisition: &AcquisitionReport, install: &InstallOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if !acquisition.failures.is_empty() {
        lines.push(format!(
            "{} module(s) could not be installed",
            acquisition.failed_modules()
        ));
    }
    if matches!(install, InstallOutcome::Failed(_)) {
        lines.push("project dependencies could not be installed".to_string());
    }
    lines
}

async fn install(config: &DojoConfig, installable: &str) -> Result<bool> {
    let artifact = workflow::install_one(config, installable).await?;
    let how = if artifact.from_cache {
        "Already cached"
    } else {
        "Built"
    };
    println!(
        "{} {} -> {}",
        how.green().bold(),
        artifact.details,
        artifact.path.display()
    );
    Ok(true)
}

fn list(config: &DojoConfig, args: &CatalogArgs) -> Result<bool> {
    let catalog = load_catalog(config, args)?;

    let versions: Vec<_> = match &args.catalog_version {
        Some(key) => vec![(key.as_str(), catalog.version(key)?)],
        None => catalog.versions().collect(),
    };

    for (key, version) in versions {
        let title = version.name.as_deref().unwrap_or(key);
        println!("{} {}", key.cyan().bold(), format!("({})", title).dimmed());
        for (id, module) in &version.modules {
            let marker = if module.checked { "*" } else { " " };
            println!("  {} {} {}", marker.green(), id, module.version.dimmed());
        }
    }
    println!();
    println!("{} preselected when --modules is not given", "*".green());
    Ok(true)
}

async fn cache(config: &DojoConfig, action: CacheAction) -> Result<bool> {
    let cache = ArchiveCache::new(default_cache_dir(config)?);

    match action {
        CacheAction::Dir => println!("{}", cache.root().display()),
        CacheAction::List => {
            let entries = cache.entries().await.context("Failed to read cache")?;
            if entries.is_empty() {
                println!("Cache is empty");
            }
            for entry in entries {
                println!(
                    "{}  {}  {} bytes",
                    &entry.hash[..12.min(entry.hash.len())],
                    entry.artifact.display(),
                    entry.size
                );
            }
        }
        CacheAction::Clean => {
            let removed = cache.clear().await.context("Failed to clear cache")?;
            println!("{} {} cache entries", "Removed".green().bold(), removed);
        }
    }
    Ok(true)
}
