//! Dependency installation in the generated project

use crate::build::run_step;
use crate::error::{BuildError, BuildStep};
use crate::runtime::ProcessRunner;
use std::path::Path;

/// Run `<package manager> install` in `destination`
pub async fn install_dependencies<R: ProcessRunner>(
    runner: &R,
    package_manager: &str,
    destination: &Path,
) -> Result<(), BuildError> {
    tracing::info!("Running {} install in {}", package_manager, destination.display());
    run_step(
        runner,
        package_manager,
        BuildStep::ProjectInstall,
        &["install".to_string()],
        destination,
    )
    .await
}
