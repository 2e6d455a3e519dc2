//! Diagnostic logging setup
//!
//! Every run appends to a log file without ANSI codes. Diagnostics are echoed
//! to stderr only in verbose mode; user-facing output goes through the binary's
//! own colored printing. `RUST_LOG` replaces the default filter.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "warn,dojo_scaffold=debug,dojo=debug";

/// Install the global subscriber.
///
/// A log file that cannot be opened is reported and skipped rather than
/// failing the run. Calling this twice is a no-op.
pub fn init(verbose: bool, log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let mut file_error = None;
    let file = log_file.and_then(|path| match open_log(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            file_error = Some(format!("Cannot open log file {}: {}", path.display(), e));
            None
        }
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .is_ok();

    if let (true, Some(message)) = (installed, file_error) {
        tracing::warn!("{}", message);
    }
}

fn open_log(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_creates_parent_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/test-cli.log");

        {
            use std::io::Write;
            let mut file = open_log(&path).unwrap();
            writeln!(file, "first").unwrap();
            let mut file = open_log(&path).unwrap();
            writeln!(file, "second").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}
