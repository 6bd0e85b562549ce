//! Default values for filesync configuration.
//!
//! This module provides centralized default values used across the run
//! driver, the template config loader and the CLI, ensuring consistency and
//! avoiding duplication.

use std::path::PathBuf;

/// Name of the template's own config file, relative to its clone.
pub const TEMPLATE_CONFIG: &str = "filesync.yaml";

/// Environment variable holding the hosting-platform token.
pub const TOKEN_VARIABLE_NAME: &str = "GITHUB_TOKEN";

/// Answers file written by the renderer into each target repository.
pub const ANSWERS_FILE: &str = ".copier-answers.yml";

pub const BRANCH_PREFIX: &str = "filesync";

pub const BRANCH_SEPARATOR: &str = "/";

/// Environment variables that, when all set, satisfy the git identity check.
pub const GIT_IDENTITY_VARS: [&str; 4] = [
    "GIT_AUTHOR_EMAIL",
    "GIT_AUTHOR_NAME",
    "GIT_COMMITTER_EMAIL",
    "GIT_COMMITTER_NAME",
];

/// Returns the default clone root directory.
///
/// Clones are scratch space, so this lives under the system temp directory
/// (`$TMPDIR/filesync_clones` on Unix) and is removed after each run unless
/// `--no-autoclean` is given.
pub fn default_clone_root() -> PathBuf {
    std::env::temp_dir().join("filesync_clones")
}
