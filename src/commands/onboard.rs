//! # Onboard Command Implementation
//!
//! Renders the template into a repository that has never used it and opens
//! the pull request. `--interactive` lets the renderer ask its questions.

use anyhow::Result;
use clap::Args;

use filesync::config::RunConfig;
use filesync::target::Operation;

/// Onboard a repo to be updated by a template
#[derive(Args, Debug)]
pub struct OnboardArgs {
    /// Repo to onboard, as name or org/name
    #[arg(value_name = "ONBOARDING_REPO")]
    pub repo: String,
}

/// Execute the `onboard` command.
pub fn execute(args: &OnboardArgs, config: RunConfig) -> Result<()> {
    let mut sync = super::prepare(config, Operation::Onboarding)?;
    sync.onboard(&args.repo)
        .map_err(super::reported)?;
    Ok(())
}
