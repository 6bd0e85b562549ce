//! # Configuration Schema and Resolution
//!
//! This module defines the typed configuration structures used by a run and
//! the single merge step that turns them into one effective configuration
//! per target repository.
//!
//! ## Layers
//!
//! Every consumer's effective configuration is built by layering:
//!
//! 1. built-in defaults ([`TemplateConfig::default`], [`RunConfig::new`]),
//! 2. values loaded from YAML (keys normalized by [`normalize_mapping`]),
//! 3. per-repository overrides from the template's `repos:` list,
//! 4. global force flags (`--dry-run`, `--interactive`).
//!
//! ## Key normalization
//!
//! YAML keys may use `-` or `_` interchangeably (`branch-prefix` and
//! `branch_prefix` are the same key). Empty-string values mean "unset" and
//! are dropped before deserialization, so the default applies.
//!
//! ## Repository entries
//!
//! Each `repos:` entry is either a bare name or a single-key mapping from the
//! name to its overrides:
//!
//! ```yaml
//! repos:
//!   - widgets
//!   - acme/gadgets:
//!       branch-prefix: chore
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::defaults;
use crate::error::{Error, Result};
use crate::shard::Shard;

/// Keys accepted in a template's config file after normalization.
const TEMPLATE_KEYS: &[&str] = &[
    "answers_file",
    "autoscan",
    "branch_prefix",
    "branch_separator",
    "dry_run",
    "hooks",
    "old_answers_files",
    "org",
    "repos",
    "shard",
    "template_branch",
];

/// Normalize a YAML mapping: `-` in keys becomes `_`, and keys whose value
/// is an empty string or null are removed.
pub fn normalize_mapping(map: Mapping) -> Mapping {
    map.into_iter()
        .filter_map(|(key, value)| {
            let key = match key {
                Value::String(s) => Value::String(s.replace('-', "_")),
                other => other,
            };
            match &value {
                Value::Null => None,
                Value::String(s) if s.is_empty() => None,
                _ => Some((key, value)),
            }
        })
        .collect()
}

/// Read a YAML file into a normalized mapping. An empty document yields an
/// empty mapping.
pub fn load_mapping(path: &Path) -> Result<Mapping> {
    let content = std::fs::read_to_string(path)?;
    parse_mapping(&content).map_err(|e| match e {
        Error::ConfigParse { message, hint } => Error::ConfigParse {
            message: format!("{}: {}", path.display(), message),
            hint,
        },
        other => other,
    })
}

/// Parse YAML text into a normalized mapping.
pub fn parse_mapping(content: &str) -> Result<Mapping> {
    let value: Value = serde_yaml::from_str(content)?;
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(normalize_mapping(map)),
        other => Err(Error::ConfigParse {
            message: format!("expected a mapping at the top level, found {}", kind(&other)),
            hint: Some("config files are `key: value` documents".to_string()),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Per-repository overrides, as written under a repository's name in the
/// template's `repos:` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
}

/// One entry of the template's repository list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoEntry {
    pub name: String,
    pub overrides: RepoOverrides,
}

/// Parse a single `repos:` entry.
///
/// A bare string has no overrides; a mapping must have exactly one key, the
/// repository name, whose value is the override map (or null).
pub fn parse_repo_entry(value: &Value) -> Result<RepoEntry> {
    match value {
        Value::String(name) => Ok(RepoEntry {
            name: name.clone(),
            overrides: RepoOverrides::default(),
        }),
        Value::Mapping(map) => {
            if map.len() != 1 {
                return Err(Error::UnrecognizedRepoConfig {
                    message: "This should have exactly one key.".to_string(),
                    entry: render_entry(value),
                });
            }
            let (key, overrides) = map.iter().next().ok_or_else(|| {
                Error::UnrecognizedRepoConfig {
                    message: "This should have exactly one key.".to_string(),
                    entry: render_entry(value),
                }
            })?;
            let name = key.as_str().ok_or_else(|| Error::UnrecognizedRepoConfig {
                message: "The repo name should be a string.".to_string(),
                entry: render_entry(value),
            })?;
            let overrides = match overrides {
                Value::Null => RepoOverrides::default(),
                Value::Mapping(m) => serde_yaml::from_value(Value::Mapping(
                    normalize_mapping(m.clone()),
                ))
                .map_err(|e| Error::UnrecognizedRepoConfig {
                    message: format!("Bad overrides for {}: {}", name, e),
                    entry: render_entry(value),
                })?,
                _ => {
                    return Err(Error::UnrecognizedRepoConfig {
                        message: format!("Overrides for {} should be a mapping.", name),
                        entry: render_entry(value),
                    })
                }
            };
            Ok(RepoEntry {
                name: name.to_string(),
                overrides,
            })
        }
        _ => Err(Error::UnrecognizedRepoConfig {
            message: "Unrecognized repo config type.".to_string(),
            entry: render_entry(value),
        }),
    }
}

fn render_entry(value: &Value) -> String {
    serde_yaml::to_string(value)
        .unwrap_or_else(|_| format!("{:?}", value))
        .trim_end()
        .to_string()
}

/// The template repository's own configuration (`filesync.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateConfig {
    pub answers_file: String,
    pub autoscan: bool,
    pub branch_prefix: String,
    pub branch_separator: String,
    pub dry_run: bool,
    pub hooks: BTreeMap<String, String>,
    /// Earlier answers-file locations still accepted when autoscanning.
    pub old_answers_files: Vec<String>,
    pub org: Option<String>,
    pub repos: Vec<RepoEntry>,
    pub shard: Option<Shard>,
    /// Template branch to sync from, overriding the CLI/default.
    pub template_branch: Option<String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            answers_file: defaults::ANSWERS_FILE.to_string(),
            autoscan: false,
            branch_prefix: defaults::BRANCH_PREFIX.to_string(),
            branch_separator: defaults::BRANCH_SEPARATOR.to_string(),
            dry_run: false,
            hooks: BTreeMap::new(),
            old_answers_files: Vec::new(),
            org: None,
            repos: Vec::new(),
            shard: None,
            template_branch: None,
        }
    }
}

/// Scalar keys of the template config, deserialized after `repos` and
/// `shard` are pulled out.
#[derive(Debug, Default, Deserialize)]
struct TemplateScalars {
    answers_file: Option<String>,
    autoscan: Option<bool>,
    branch_prefix: Option<String>,
    branch_separator: Option<String>,
    dry_run: Option<bool>,
    hooks: Option<BTreeMap<String, String>>,
    old_answers_files: Option<Vec<String>>,
    org: Option<String>,
    template_branch: Option<String>,
}

impl TemplateConfig {
    /// Load and parse a template config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_mapping(load_mapping(path)?)
    }

    /// Parse a template config from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_mapping(parse_mapping(content)?)
    }

    fn from_mapping(mut map: Mapping) -> Result<Self> {
        for key in map.keys() {
            match key.as_str() {
                Some(k) if TEMPLATE_KEYS.contains(&k) => {}
                _ => log::warn!("ignoring unknown template config key: {:?}", key),
            }
        }
        map.retain(|k, _| k.as_str().is_some_and(|k| TEMPLATE_KEYS.contains(&k)));

        let repos = match map.remove("repos") {
            None => Vec::new(),
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(parse_repo_entry)
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(Error::ConfigParse {
                    message: format!("repos must be a list, found {}", kind(&other)),
                    hint: Some("use `repos: [repo-a, repo-b]`".to_string()),
                })
            }
        };

        let shard = match map.remove("shard") {
            None => None,
            Some(Value::String(mode)) => Some(mode.parse::<Shard>()?),
            Some(other) => {
                return Err(Error::ShardConfig {
                    mode: render_entry(&other),
                })
            }
        };

        let scalars: TemplateScalars =
            serde_yaml::from_value(Value::Mapping(map)).map_err(|e| Error::ConfigParse {
                message: e.to_string(),
                hint: None,
            })?;

        let defaults = Self::default();
        Ok(Self {
            answers_file: scalars.answers_file.unwrap_or(defaults.answers_file),
            autoscan: scalars.autoscan.unwrap_or(defaults.autoscan),
            branch_prefix: scalars.branch_prefix.unwrap_or(defaults.branch_prefix),
            branch_separator: scalars
                .branch_separator
                .unwrap_or(defaults.branch_separator),
            dry_run: scalars.dry_run.unwrap_or(defaults.dry_run),
            hooks: scalars.hooks.unwrap_or_default(),
            old_answers_files: scalars.old_answers_files.unwrap_or_default(),
            org: scalars.org,
            repos,
            shard,
            template_branch: scalars.template_branch,
        })
    }

    /// Look up the overrides configured for `name`, if it is listed.
    pub fn repo_overrides(&self, name: &str) -> Option<&RepoOverrides> {
        self.repos
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.overrides)
    }

    /// Names from the `repos:` list, in file order.
    pub fn repo_names(&self) -> Vec<String> {
        self.repos.iter().map(|entry| entry.name.clone()).collect()
    }

    /// Every answers-file path that marks a repository as onboarded.
    pub fn answers_file_paths(&self) -> Vec<String> {
        let mut paths = vec![self.answers_file.clone()];
        paths.extend(self.old_answers_files.iter().cloned());
        paths
    }

    /// Log the effective config, one YAML document, skipping unset values.
    pub fn log_config(&self, target: &str, source: &Path) {
        log::info!(target: target, "config path loaded: {}", source.display());
        match serde_yaml::to_value(self) {
            Ok(Value::Mapping(map)) => {
                let filtered: Mapping = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
                let rendered = serde_yaml::to_string(&filtered).unwrap_or_default();
                log::info!(target: target, "with config:\n{}", rendered.trim_end());
            }
            _ => log::info!(target: target, "with config: {:?}", self),
        }
    }
}

/// Global run options, resolved from the CLI and an optional `--config`
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Template repository, `org/name` or bare name.
    pub template: String,
    /// Remove clones from disk after running.
    pub autoclean: bool,
    pub clone_root: PathBuf,
    pub dry_run: bool,
    pub interactive: bool,
    pub log_level: Option<String>,
    pub logging_config: Option<PathBuf>,
    /// Branch of the template to sync from.
    pub template_branch: Option<String>,
    /// Path of the config file inside the template repository.
    pub template_config: String,
    /// Name of the environment variable holding the token.
    pub token_variable_name: String,
    /// `always`, `never` or `auto`.
    pub color: String,
}

impl RunConfig {
    /// A run config with built-in defaults for everything but the template.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            autoclean: true,
            clone_root: defaults::default_clone_root(),
            dry_run: false,
            interactive: false,
            log_level: None,
            logging_config: None,
            template_branch: None,
            template_config: defaults::TEMPLATE_CONFIG.to_string(),
            token_variable_name: defaults::TOKEN_VARIABLE_NAME.to_string(),
            color: "auto".to_string(),
        }
    }
}

/// Values for global options supplied by a `--config` YAML file.
///
/// Anything left as `None` falls through to the built-in default; anything
/// given on the command line wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfigFile {
    pub autoclean: Option<bool>,
    pub clone_root: Option<PathBuf>,
    pub dry_run: Option<bool>,
    pub interactive: Option<bool>,
    pub log_level: Option<String>,
    pub logging_config: Option<PathBuf>,
    pub template_branch: Option<String>,
    pub template_config: Option<String>,
    pub token_variable_name: Option<String>,
    pub color: Option<String>,
}

impl RunConfigFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let map = load_mapping(path)?;
        serde_yaml::from_value(Value::Mapping(map)).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e),
            hint: Some("keys must match the long names of the global options".to_string()),
        })
    }
}

/// The flattened configuration for one target repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
    pub org: String,
    pub name: String,
    pub answers_file: String,
    pub branch_prefix: String,
    pub branch_separator: String,
    pub dry_run: bool,
    pub interactive: bool,
    pub hooks: BTreeMap<String, String>,
    pub base_branch: Option<String>,
}

/// Split `org/name` into its parts, falling back to `default_org` for a
/// bare name.
pub fn split_org_and_name(repo: &str, default_org: Option<&str>) -> Result<(String, String)> {
    match repo.split_once('/') {
        Some((org, name)) => {
            // anything past a second slash is not part of the name
            let name = name.split('/').next().unwrap_or(name);
            Ok((org.to_string(), name.to_string()))
        }
        None => {
            let org = default_org.ok_or_else(|| Error::MissingRequiredConfig {
                message: "No org was specified in defaults or in the repo name".to_string(),
            })?;
            Ok((org.to_string(), repo.to_string()))
        }
    }
}

/// Build the effective settings for `repo`: template defaults, then the
/// repository's overrides, then the global force flags.
pub fn resolve_repo(template: &TemplateConfig, run: &RunConfig, repo: &str) -> Result<RepoSettings> {
    let overrides = template.repo_overrides(repo).cloned().unwrap_or_default();

    let (org, name) = match repo.split_once('/') {
        Some(_) => {
            let (name_org, name) = split_org_and_name(repo, None)?;
            if let Some(config_org) = &overrides.org {
                if *config_org != name_org {
                    return Err(Error::AmbiguousOrgConfig {
                        name,
                        name_org,
                        config_org: config_org.clone(),
                    });
                }
            }
            (name_org, name)
        }
        None => {
            let default_org = overrides.org.as_deref().or(template.org.as_deref());
            split_org_and_name(repo, default_org)?
        }
    };

    Ok(RepoSettings {
        org,
        name,
        answers_file: overrides
            .answers_file
            .unwrap_or_else(|| template.answers_file.clone()),
        branch_prefix: overrides
            .branch_prefix
            .unwrap_or_else(|| template.branch_prefix.clone()),
        branch_separator: overrides
            .branch_separator
            .unwrap_or_else(|| template.branch_separator.clone()),
        // the global flags only ever force these on
        dry_run: run.dry_run || overrides.dry_run.unwrap_or(template.dry_run),
        interactive: run.interactive || overrides.interactive.unwrap_or(false),
        hooks: overrides.hooks.unwrap_or_else(|| template.hooks.clone()),
        base_branch: overrides.base_branch,
    })
}
