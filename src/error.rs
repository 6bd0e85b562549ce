//! # Error Handling
//!
//! This module defines the centralized error type for `filesync`. It uses
//! `thiserror` to build a single `Error` enum that covers every failure the
//! library can report, from configuration problems detected before any
//! repository is touched to per-repository failures raised mid-update.
//!
//! ## Error classes
//!
//! Errors fall into two classes, and the run driver treats them differently:
//!
//! - **Configuration errors** (`AmbiguousOrgConfig`, `MissingRequiredConfig`,
//!   `UnrecognizedRepoConfig`, `TemplateConfigMissing`, `ConfigParse`,
//!   `GitConfig`, `ShardConfig`) are fatal to the whole run. They surface
//!   while the run is set up, before any repository is touched. See
//!   [`Error::is_config_error`].
//! - **Repository errors** (`DirtyRepo`, `UnrecognizableBaseBranch`,
//!   `HookFailure`, `AnswersFile`, and the git/API/render plumbing errors)
//!   are fatal only to the repository being processed during a
//!   multi-repository update.
//!
//! The `Result` type alias is used to return `Result<T, Error>` from every
//! library function.

use thiserror::Error;

/// Main error type for filesync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A repository name embeds an org that disagrees with its configured org.
    #[error("repo {name} has more than one org: in repo name: {name_org} in config file: {config_org}")]
    AmbiguousOrgConfig {
        name: String,
        name_org: String,
        config_org: String,
    },

    /// The local clone has uncommitted changes.
    #[error("repo {name} is dirty! can't proceed")]
    DirtyRepo { name: String },

    /// The credential or the git identity is missing.
    #[error("Git configuration error: {message}")]
    GitConfig { message: String },

    /// A configured hook exited non-zero (or could not be started).
    #[error("{hook} hook {script} failed with exit code {}: stderr: \"{stderr}\"", code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    HookFailure {
        hook: String,
        script: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A required configuration value is absent.
    #[error("Missing required configuration: {message}")]
    MissingRequiredConfig { message: String },

    /// The template clone does not contain its config file.
    #[error("{path} not found in {template}!")]
    TemplateConfigMissing { path: String, template: String },

    /// Neither the override nor `main`/`master` identifies a base branch.
    #[error("unable to determine {what} for {name}")]
    UnrecognizableBaseBranch { name: String, what: String },

    /// A `repos:` entry is neither a bare name nor a single-key mapping.
    #[error("Something is misconfigured! {message}\n{entry}")]
    UnrecognizedRepoConfig { message: String, entry: String },

    /// An error occurred while parsing a YAML configuration file.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A repository's answers file is not a YAML mapping.
    #[error("{path}: answers file is not a mapping")]
    AnswersFile { path: String },

    /// The template config names a shard mode that does not exist.
    #[error("bad shard config: '{mode}'")]
    ShardConfig { mode: String },

    /// An error occurred while executing a Git command.
    #[error("Git command failed in {dir}: git {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// The external template renderer failed.
    #[error("Render error for {destination}: {message}")]
    Render {
        destination: String,
        message: String,
    },

    /// The hosting platform answered with a non-success status.
    #[error("Hosting API error: {method} {url} returned {status}: {message}")]
    Api {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    /// The hosting platform could not be reached.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON decoding error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` for errors that invalidate the whole run rather than a
    /// single repository.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousOrgConfig { .. }
                | Error::GitConfig { .. }
                | Error::MissingRequiredConfig { .. }
                | Error::TemplateConfigMissing { .. }
                | Error::UnrecognizedRepoConfig { .. }
                | Error::ConfigParse { .. }
                | Error::ShardConfig { .. }
        )
    }

    /// Returns `true` when the hosting platform reported a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_ambiguous_org() {
        let error = Error::AmbiguousOrgConfig {
            name: "widgets".to_string(),
            name_org: "acme".to_string(),
            config_org: "other".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("more than one org"));
        assert!(display.contains("acme"));
        assert!(display.contains("other"));
    }

    #[test]
    fn test_error_display_dirty_repo() {
        let error = Error::DirtyRepo {
            name: "widgets".to_string(),
        };
        assert_eq!(error.to_string(), "repo widgets is dirty! can't proceed");
    }

    #[test]
    fn test_error_display_hook_failure() {
        let error = Error::HookFailure {
            hook: "pre-push".to_string(),
            script: "hooks/check.sh".to_string(),
            code: Some(3),
            stderr: "nope".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("pre-push hook hooks/check.sh"));
        assert!(display.contains("exit code 3"));
        assert!(display.contains("\"nope\""));
    }

    #[test]
    fn test_error_display_hook_failure_without_code() {
        let error = Error::HookFailure {
            hook: "post-clone".to_string(),
            script: "hooks/x".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(error.to_string().contains("exit code none"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "repos must be a list".to_string(),
            hint: Some("use `repos: [a, b]`".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn test_error_display_api() {
        let error = Error::Api {
            method: "GET".to_string(),
            url: "https://api.github.com/repos/acme/widgets".to_string(),
            status: 404,
            message: "Not Found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("returned 404"));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::MissingRequiredConfig {
            message: "org is required!".to_string()
        }
        .is_config_error());
        assert!(Error::UnrecognizedRepoConfig {
            message: "x".to_string(),
            entry: "y".to_string()
        }
        .is_config_error());
        assert!(!Error::DirtyRepo {
            name: "w".to_string()
        }
        .is_config_error());
        assert!(!Error::HookFailure {
            hook: "pre-clone".to_string(),
            script: "s".to_string(),
            code: Some(1),
            stderr: String::new(),
        }
        .is_config_error());
        assert!(!Error::AnswersFile {
            path: "widgets/.copier-answers.yml".to_string()
        }
        .is_config_error());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_str = "invalid: [unclosed";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }
}
