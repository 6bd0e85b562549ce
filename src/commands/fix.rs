//! # Fix Command Implementation
//!
//! Re-renders the template onto the branch of an existing template pull
//! request and pushes the result to that same branch.

use anyhow::Result;
use clap::Args;

use filesync::config::RunConfig;
use filesync::target::Operation;

/// Fix an existing template PR
#[derive(Args, Debug)]
pub struct FixArgs {
    /// Repo with the pull request, as name or org/name
    #[arg(value_name = "REPO")]
    pub repo: String,

    /// Branch of the pull request to fix
    #[arg(value_name = "EXISTING_BRANCH")]
    pub existing_branch: String,
}

/// Execute the `fix` command.
pub fn execute(args: &FixArgs, config: RunConfig) -> Result<()> {
    let mut sync = super::prepare(config, Operation::Fixing)?;
    sync.fix(&args.repo, &args.existing_branch)
        .map_err(super::reported)?;
    Ok(())
}
