//! # Update Command Implementation
//!
//! Applies the template's current head to every repository in its list
//! (plus, with `autoscan`, every onboarded repository in the org), or to a
//! single repository given with `--single-repo`.
//!
//! A failure in one repository of a list run is logged and the run moves
//! on; the run itself still succeeds.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use filesync::config::RunConfig;
use filesync::target::Operation;

/// Update repos already configured for a template
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Update this repo only; bypass repo list / scanning
    #[arg(short = '1', long, value_name = "REPO")]
    pub single_repo: Option<String>,

    /// Don't query the GitHub API; read repo names from this file, one per line
    #[arg(short, long, value_name = "FILE")]
    pub cache: Option<PathBuf>,
}

/// Execute the `update` command.
pub fn execute(args: &UpdateArgs, config: RunConfig) -> Result<()> {
    let mut sync = super::prepare(config, Operation::Updating)?;
    sync.update(args.single_repo.as_deref(), args.cache.as_deref())
        .map_err(super::reported)?;
    Ok(())
}
