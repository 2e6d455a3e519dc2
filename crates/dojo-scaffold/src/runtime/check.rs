//! Detection of the external tools a run depends on

use crate::error::PreconditionError;
use std::process::Stdio;
use tokio::process::Command;

/// Tool detection result
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: Option<String>,
    pub available: bool,
}

/// Check whether `program --version` runs successfully
pub async fn check_tool(program: &str) -> RuntimeInfo {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
            RuntimeInfo {
                name: program.to_string(),
                version: Some(version),
                available: true,
            }
        }
        _ => RuntimeInfo {
            name: program.to_string(),
            version: None,
            available: false,
        },
    }
}

/// Fail with a precondition error unless the package manager is installed
pub async fn require_tool(program: &str) -> Result<RuntimeInfo, PreconditionError> {
    let info = check_tool(program).await;
    if info.available {
        tracing::debug!(
            "Found {} {}",
            info.name,
            info.version.as_deref().unwrap_or("unknown")
        );
        Ok(info)
    } else {
        Err(PreconditionError::MissingTool(program.to_string()))
    }
}
