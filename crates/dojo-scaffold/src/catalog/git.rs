//! Git-source version specifiers (`github:<owner>/<repo>#<commit>`)

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Revision used when a specifier names no commit
pub const DEFAULT_COMMIT: &str = "master";

static GIT_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^github:([\w.-]+)/([\w.-]+)(?:#(\S+))?$").expect("git specifier pattern is valid")
});

/// Remote source of a git-sourced module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitInstallableDetails {
    pub owner: String,
    pub repo: String,
    pub commit: String,
}

impl GitInstallableDetails {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            commit: commit.into(),
        }
    }

    /// Parse a version string; `None` means it is a plain registry version.
    ///
    /// An owner or repo made only of dots (`.`, `..`) is rejected, since both
    /// become path and URL segments.
    pub fn parse(version: &str) -> Option<Self> {
        let captures = GIT_SPECIFIER.captures(version.trim())?;
        let (owner, repo) = (&captures[1], &captures[2]);
        if is_dot_segment(owner) || is_dot_segment(repo) {
            return None;
        }
        let commit = captures
            .get(3)
            .map_or(DEFAULT_COMMIT, |m| m.as_str())
            .to_string();
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            commit,
        })
    }

    /// Commit usable as a single file-name component.
    ///
    /// `%`, `/` and `\` are percent-encoded, so distinct commits never share a slug
    /// (`feat/x` becomes `feat%2Fx`, `feat-x` stays as it is).
    pub fn commit_slug(&self) -> String {
        let mut slug = String::with_capacity(self.commit.len());
        for c in self.commit.chars() {
            match c {
                '%' => slug.push_str("%25"),
                '/' => slug.push_str("%2F"),
                '\\' => slug.push_str("%5C"),
                _ => slug.push(c),
            }
        }
        slug
    }
}

impl fmt::Display for GitInstallableDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "github:{}/{}#{}", self.owner, self.repo, self.commit)
    }
}

fn is_dot_segment(segment: &str) -> bool {
    segment.chars().all(|c| c == '.')
}

/// Whether a version string is a git-source specifier
pub fn is_git_installable(version: &str) -> bool {
    GitInstallableDetails::parse(version).is_some()
}
