//! # CLI Command Implementations
//!
//! One module per subcommand. Each defines an `Args` struct derived with
//! `clap` and an `execute` function that hands the merged [`RunConfig`] to
//! the [`FileSync`] driver in the `filesync` library.
//!
//! [`prepare`] holds the setup every subcommand shares: logging, the
//! interrupt handler and the driver itself. Errors returned by a driver
//! run pass through [`reported`] so `main` does not print them a second
//! time.

pub mod fix;
pub mod onboard;
pub mod update;

use std::fmt;

use anyhow::{Context, Result};

use filesync::config::RunConfig;
use filesync::driver::{self, FileSync};
use filesync::error::Error;
use filesync::logging::LoggingConfig;
use filesync::output::OutputConfig;
use filesync::target::Operation;

/// Set up logging and interrupt handling, then build the driver.
pub fn prepare(config: RunConfig, operation: Operation) -> Result<FileSync> {
    let logging = LoggingConfig::load(config.logging_config.as_deref())
        .context("Failed to load logging config")?;
    let level = logging.resolve_level(config.log_level.as_deref(), config.dry_run, operation);
    logging.init(&level)?;

    driver::install_interrupt_handler(&config)?;

    let output = OutputConfig::from_env_and_flag(&config.color);
    Ok(FileSync::new(config, operation, output)?)
}

/// A driver error that was already written to the log.
#[derive(Debug)]
pub struct Reported(pub Error);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for Reported {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.0)
    }
}

/// Wrap an error from a driver run, marking it [`Reported`] when the
/// driver's error log line is visible.
pub fn reported(error: Error) -> anyhow::Error {
    if log::log_enabled!(target: driver::LOG_TARGET, log::Level::Error) {
        Reported(error).into()
    } else {
        error.into()
    }
}
