//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance and
//! for making sure that important messages reach the user even when the
//! active log level would hide them.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Log or print
//!
//! `onboard` and `fix` default to the `error` level, which would swallow the
//! pull request URL logged at `info`. [`Reporter::report`] checks whether the
//! record would be emitted and falls back to stdout when it would not.

use std::env;

use console::style;
use log::Level;

/// Whether styled output (the dry-run banner) uses color.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve `--color` (`always`, `never`, anything else means auto).
    ///
    /// Auto turns color off for `NO_COLOR` (even empty), `CLICOLOR=0` and
    /// `TERM=dumb`, forces it on for a non-empty `CLICOLOR_FORCE` other than
    /// `0`, and otherwise asks whether stdout is a color terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = if color_flag.eq_ignore_ascii_case("always") {
            true
        } else if color_flag.eq_ignore_ascii_case("never") {
            false
        } else {
            auto_color(|key| env::var_os(key).map(|v| v.to_string_lossy().into_owned()))
        };
        Self { use_color }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

fn auto_color(var: impl Fn(&str) -> Option<String>) -> bool {
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    var("TERM").as_deref() != Some("dumb") && console::Term::stdout().features().colors_supported()
}

/// Sends user-facing messages to the log, or to stdout when the log would
/// drop them.
#[derive(Debug, Clone)]
pub struct Reporter {
    target: String,
    output: OutputConfig,
}

impl Reporter {
    /// Create a reporter that logs under `target`.
    pub fn new(target: impl Into<String>, output: OutputConfig) -> Self {
        Self {
            target: target.into(),
            output,
        }
    }

    /// A reporter with the same output settings logging under `target`.
    pub fn with_target(&self, target: impl Into<String>) -> Self {
        Self::new(target, self.output.clone())
    }

    /// The log target used for messages that do get logged.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Log `message` at `level` if that level is enabled for this target,
    /// otherwise print it.
    ///
    /// Returns `true` when the message went to the logger.
    pub fn report(&self, level: Level, message: &str) -> bool {
        if log::log_enabled!(target: self.target.as_str(), level) {
            log::log!(target: self.target.as_str(), level, "{}", message);
            true
        } else {
            println!("{}", message);
            false
        }
    }

    /// Announce dry-run mode prominently.
    pub fn dry_run_banner(&self) {
        let headline = if self.output.use_color {
            style("DRY RUN MODE ENABLED!").yellow().bold().to_string()
        } else {
            "DRY RUN MODE ENABLED!".to_string()
        };
        self.report(Level::Warn, &headline);
        self.report(
            Level::Warn,
            "Nothing will be pushed to origin and no PRs will be opened, but \
             copier will still run and local branches will still be created. \
             Cloning and cleanup will happen as needed.",
        );
    }
}
