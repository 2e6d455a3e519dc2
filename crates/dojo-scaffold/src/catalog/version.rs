//! `cliVersion` requirements attached to catalog versions
//!
//! A catalog version may name the CLI it was written for, either as a bare
//! minimum (`0.2.0`, `v0.2.0`) or as a semver range (`>=0.2, <0.4`). A CLI
//! outside the requirement still runs; the caller only gets a notice.

use super::CatalogVersion;
use semver::{Version, VersionReq};
use std::fmt;

/// Parsed `cliVersion` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliRequirement {
    AtLeast(Version),
    Range(VersionReq),
}

impl CliRequirement {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(minimum) = parse_cli_version(raw) {
            return Some(Self::AtLeast(minimum));
        }
        VersionReq::parse(raw).ok().map(Self::Range)
    }

    pub fn admits(&self, cli: &Version) -> bool {
        match self {
            Self::AtLeast(minimum) => cli >= minimum,
            Self::Range(range) => range.matches(cli),
        }
    }
}

impl fmt::Display for CliRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast(minimum) => write!(f, "{} or newer", minimum),
            Self::Range(range) => write!(f, "{}", range),
        }
    }
}

impl CatalogVersion {
    pub fn cli_requirement(&self) -> Option<CliRequirement> {
        let raw = self.cli_version.as_deref()?;
        let requirement = CliRequirement::parse(raw);
        if requirement.is_none() {
            tracing::debug!("Ignoring unreadable cliVersion '{}'", raw);
        }
        requirement
    }

    /// Notice for a CLI this catalog version was not written for.
    ///
    /// `None` when there is no requirement, it is met, or either side is unreadable.
    pub fn compatibility_warning(&self, cli_version: &str, upgrade_command: &str) -> Option<String> {
        let requirement = self.cli_requirement()?;
        let cli = parse_cli_version(cli_version)?;
        if requirement.admits(&cli) {
            return None;
        }
        let label = self.name.as_deref().unwrap_or("This catalog");
        Some(format!(
            "{} expects CLI {}, running {}; upgrade with `{}`",
            label, requirement, cli, upgrade_command
        ))
    }
}

fn parse_cli_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}
