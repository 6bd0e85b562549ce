//! # Template Handle
//!
//! [`TemplateHandle`] wraps the template repository's [`RepositoryHandle`]
//! together with the configuration file read from its clone. Opening a
//! template clones it, loads and validates its config, applies any
//! `template_branch` from that config and resolves the head commit, so that
//! afterwards the handle is only read from.

use std::path::Path;

use crate::config::TemplateConfig;
use crate::error::{Error, Result};
use crate::hooks;
use crate::repository::RepositoryHandle;
use crate::target::Operation;

pub struct TemplateHandle {
    repo: RepositoryHandle,
    config: TemplateConfig,
    /// Template revision handed to the renderer.
    vcs_ref: String,
    head: String,
}

impl TemplateHandle {
    /// Clone the template and load `config_file` from the clone.
    pub fn open(repo: RepositoryHandle, config_file: &str, operation: Operation) -> Result<Self> {
        let target = format!("filesync::template::{}", repo.name());
        let mut repo = repo.with_log_target(target);
        log::debug!(target: repo.log_target(), "initializing template {}...", repo.id().full_name());
        repo.clone()?;

        let config_path = repo.clone_path().join(config_file);
        if !config_path.exists() {
            return Err(Error::TemplateConfigMissing {
                path: config_file.to_string(),
                template: repo.name().to_string(),
            });
        }
        let config = TemplateConfig::from_file(&config_path)?;
        validate(&config, operation, repo.log_target())?;

        // the branch can only be read from the clone itself, so switch again
        if let Some(branch) = &config.template_branch {
            repo.set_base_branch(branch.clone());
        }
        let vcs_ref = repo.base_branch()?;
        config.log_config(repo.log_target(), &config_path);
        repo.maybe_switch_branch()?;
        let head = repo.head()?;

        log::debug!(target: repo.log_target(), "template initialization ok, head {}", head);
        Ok(Self {
            repo,
            config,
            vcs_ref,
            head,
        })
    }

    pub fn name(&self) -> &str {
        self.repo.name()
    }

    /// The organization targets default to.
    pub fn org(&self) -> &str {
        self.config.org.as_deref().unwrap_or_default()
    }

    pub fn clone_path(&self) -> &Path {
        self.repo.clone_path()
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn vcs_ref(&self) -> &str {
        &self.vcs_ref
    }

    /// Commit at the tip of the template's base branch.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// The template's base branch; the same value as the render ref.
    pub fn base_branch(&self) -> &str {
        &self.vcs_ref
    }

    pub fn log_target(&self) -> &str {
        self.repo.log_target()
    }
}

fn validate(config: &TemplateConfig, operation: Operation, target: &str) -> Result<()> {
    log::debug!(target: target, "validating template config...");
    if config.org.is_none() {
        return Err(Error::MissingRequiredConfig {
            message: "org is required!".to_string(),
        });
    }
    if operation == Operation::Updating && !config.autoscan && config.repos.is_empty() {
        return Err(Error::MissingRequiredConfig {
            message: "repo list is empty and autoscan is disabled! nothing to do!".to_string(),
        });
    }
    for key in hooks::unknown_hooks(&config.hooks) {
        log::warn!(target: target, "ignoring unknown hook: {}", key);
    }
    Ok(())
}
