//! # Logging Setup
//!
//! Log records go through the `log` facade and are written by `env_logger`.
//! An optional YAML file (`--logging-config`) controls the line format, the
//! timestamp format, the level, the level applied to dependencies, and an
//! optional log file:
//!
//! ```yaml
//! format: "{timestamp} {level:<8} - {target}: {message}"
//! datefmt: "%Y-%m-%d %H:%M:%S"
//! level: info
//! dependency-level: warn
//! filename: /var/log/filesync.log
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter};
use serde::Deserialize;
use serde_yaml::Value;

use crate::config::load_mapping;
use crate::error::{Error, Result};
use crate::target::Operation;

pub const DEFAULT_FORMAT: &str = "{timestamp} {level:<8} - {target}: {message}";
pub const DEFAULT_DATEFMT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_LEVEL: &str = "info";
pub const DEFAULT_DEPENDENCY_LEVEL: &str = "warn";

/// Crates whose records are filtered by `dependency_level`.
const DEPENDENCIES: &[&str] = &["ureq", "rustls"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: String,
    pub datefmt: String,
    pub level: String,
    pub dependency_level: String,
    pub filename: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingConfigFile {
    format: Option<String>,
    datefmt: Option<String>,
    level: Option<String>,
    dependency_level: Option<String>,
    filename: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            datefmt: DEFAULT_DATEFMT.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            dependency_level: DEFAULT_DEPENDENCY_LEVEL.to_string(),
            filename: None,
        }
    }
}

impl LoggingConfig {
    /// Load the config at `path`, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let file: LoggingConfigFile = serde_yaml::from_value(Value::Mapping(load_mapping(path)?))
            .map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e),
                hint: Some(
                    "valid keys are format, datefmt, level, dependency-level and filename"
                        .to_string(),
                ),
            })?;
        let defaults = Self::default();
        let config = Self {
            format: file.format.unwrap_or(defaults.format),
            datefmt: file.datefmt.unwrap_or(defaults.datefmt),
            level: file.level.unwrap_or(defaults.level),
            dependency_level: file.dependency_level.unwrap_or(defaults.dependency_level),
            filename: file.filename,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if StrftimeItems::new(&self.datefmt).any(|item| matches!(item, Item::Error)) {
            return Err(Error::ConfigParse {
                message: format!("invalid datefmt: {:?}", self.datefmt),
                hint: Some("use strftime specifiers such as %Y-%m-%d %H:%M:%S".to_string()),
            });
        }
        parse_level(&self.level)?;
        parse_level(&self.dependency_level)?;
        Ok(())
    }

    /// The level to run at: an explicit level wins; otherwise dry runs are
    /// verbose, onboarding and fixing are quiet, and updating uses the
    /// configured level.
    pub fn resolve_level(&self, explicit: Option<&str>, dry_run: bool, operation: Operation) -> String {
        if let Some(level) = explicit {
            return level.to_string();
        }
        if dry_run {
            return "debug".to_string();
        }
        if operation != Operation::Updating {
            return "error".to_string();
        }
        self.level.clone()
    }

    /// Install the global logger. A logger that is already installed is
    /// left in place.
    pub fn init(&self, level: &str) -> Result<()> {
        let app_level = parse_level(level)?;
        let dependency_level = parse_level(&self.dependency_level)?;

        let mut builder = env_logger::Builder::new();
        builder.filter_level(app_level);
        for dependency in DEPENDENCIES {
            builder.filter_module(dependency, dependency_level);
        }

        let format = self.format.clone();
        let datefmt = self.datefmt.clone();
        builder.format(move |buf, record| {
            let line = render_line(
                &format,
                &datefmt,
                Local::now(),
                record.level(),
                record.target(),
                &record.args().to_string(),
            );
            writeln!(buf, "{}", line)
        });

        if let Some(filename) = &self.filename {
            let file = OpenOptions::new().create(true).append(true).open(filename)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        if builder.try_init().is_err() {
            log::debug!("logger already initialized");
        }
        Ok(())
    }
}

/// Parse a level name. `warning`, `critical` and `fatal` are accepted as
/// aliases, and `off` disables logging.
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "critical" | "fatal" | "error" => Ok(LevelFilter::Error),
        "warning" | "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => Err(Error::ConfigParse {
            message: format!("unknown log level: {}", other),
            hint: Some("use one of error, warn, info, debug, trace".to_string()),
        }),
    }
}

/// Fill the placeholders of `format`. `{level}` also takes a width, as in
/// `{level:<8}`; unknown placeholders are copied through.
pub fn render_line(
    format: &str,
    datefmt: &str,
    now: DateTime<Local>,
    level: Level,
    target: &str,
    message: &str,
) -> String {
    let mut out = String::with_capacity(format.len() + message.len());
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let (name, width) = match after[..close].split_once(":<") {
            Some((name, width)) => (name, width.parse::<usize>().ok()),
            None => (&after[..close], None),
        };
        let value = match name {
            "timestamp" => Some(now.format(datefmt).to_string()),
            "level" => Some(level.to_string()),
            "target" => Some(target.to_string()),
            "message" => Some(message.to_string()),
            _ => None,
        };
        match value {
            Some(value) => match width {
                Some(width) => out.push_str(&format!("{:<width$}", value, width = width)),
                None => out.push_str(&value),
            },
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}
