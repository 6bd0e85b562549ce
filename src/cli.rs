//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use filesync::config::{RunConfig, RunConfigFile};

use crate::commands;

/// Filesync - Keep repositories in sync with a copier template
#[derive(Parser, Debug)]
#[command(name = "filesync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Template repository, as org/name
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    /// Remove clones from disk after running (default)
    #[arg(long, overrides_with = "no_autoclean")]
    pub autoclean: bool,

    /// Keep clones on disk after running
    #[arg(long)]
    pub no_autoclean: bool,

    /// Path to clone repos into
    #[arg(short = 'r', long, value_name = "DIR", env = "FILESYNC_CLONE_ROOT")]
    pub clone_root: Option<PathBuf>,

    /// Don't push changes to cloned repos
    #[arg(short, long)]
    pub dry_run: bool,

    /// Run in interactive mode to be asked onboarding questions
    #[arg(short, long)]
    pub interactive: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to a logging config YAML file
    #[arg(long, value_name = "FILE")]
    pub logging_config: Option<PathBuf>,

    /// Branch of the template to sync from
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub template_branch: Option<String>,

    /// Path inside the template repo where its config is stored
    #[arg(short = 't', long, value_name = "PATH")]
    pub template_config: Option<String>,

    /// Name of the environment variable storing the GitHub token
    #[arg(short = 'e', long, value_name = "NAME")]
    pub token_variable_name: Option<String>,

    /// Read default option values from a YAML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update repos already configured for a template
    Update(commands::update::UpdateArgs),

    /// Onboard a repo to be updated by a template
    Onboard(commands::onboard::OnboardArgs),

    /// Fix an existing template PR
    Fix(commands::fix::FixArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let config = self.run_config()?;
        match &self.command {
            Commands::Update(args) => commands::update::execute(args, config),
            Commands::Onboard(args) => commands::onboard::execute(args, config),
            Commands::Fix(args) => commands::fix::execute(args, config),
        }
    }

    /// Merge the command line over the `--config` file over the defaults.
    pub fn run_config(&self) -> Result<RunConfig> {
        let file = match &self.config {
            Some(path) => RunConfigFile::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => RunConfigFile::default(),
        };
        Ok(merge(self, file))
    }

    fn autoclean_flag(&self) -> Option<bool> {
        if self.no_autoclean {
            Some(false)
        } else if self.autoclean {
            Some(true)
        } else {
            None
        }
    }
}

fn merge(cli: &Cli, file: RunConfigFile) -> RunConfig {
    let defaults = RunConfig::new(cli.template.clone());
    RunConfig {
        autoclean: cli
            .autoclean_flag()
            .or(file.autoclean)
            .unwrap_or(defaults.autoclean),
        clone_root: cli
            .clone_root
            .clone()
            .or(file.clone_root)
            .unwrap_or(defaults.clone_root),
        dry_run: cli.dry_run || file.dry_run.unwrap_or(defaults.dry_run),
        interactive: cli.interactive || file.interactive.unwrap_or(defaults.interactive),
        log_level: cli.log_level.clone().or(file.log_level),
        logging_config: cli.logging_config.clone().or(file.logging_config),
        template_branch: cli.template_branch.clone().or(file.template_branch),
        template_config: cli
            .template_config
            .clone()
            .or(file.template_config)
            .unwrap_or(defaults.template_config),
        token_variable_name: cli
            .token_variable_name
            .clone()
            .or(file.token_variable_name)
            .unwrap_or(defaults.token_variable_name),
        color: cli.color.clone().or(file.color).unwrap_or(defaults.color),
        template: defaults.template,
    }
}
