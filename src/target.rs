//! # Target Repositories
//!
//! A [`TargetRepository`] is one repository the template is applied to in
//! this run. It holds the repository's [`RepositoryHandle`] and its
//! effective settings. The values the lifecycle keys on (update branch name,
//! recorded template version, whether an update is needed) are computed on
//! demand from the handle and the template, never stored.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::RepoSettings;
use crate::error::Result;
use crate::render;
use crate::repository::RepositoryHandle;
use crate::template::TemplateHandle;

/// What a run does to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Apply the latest template to repositories that already use it.
    Updating,
    /// Apply the template to a repository for the first time.
    Onboarding,
    /// Re-render onto an existing update branch and its pull request.
    Fixing,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Updating => "updating",
            Operation::Onboarding => "onboarding",
            Operation::Fixing => "fixing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TargetRepository {
    pub handle: RepositoryHandle,
    pub operation: Operation,
    pub answers_file: String,
    pub branch_prefix: String,
    pub branch_separator: String,
    pub hooks: BTreeMap<String, String>,
}

impl TargetRepository {
    /// Build a target from its handle and resolved settings. The settings'
    /// flags and base branch are applied to the handle.
    pub fn new(handle: RepositoryHandle, settings: RepoSettings, operation: Operation) -> Self {
        let handle = handle
            .with_flags(settings.dry_run, settings.interactive)
            .with_base_branch(settings.base_branch);
        Self {
            handle,
            operation,
            answers_file: settings.answers_file,
            branch_prefix: settings.branch_prefix,
            branch_separator: settings.branch_separator,
            hooks: settings.hooks,
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn fixing(&self) -> bool {
        self.operation == Operation::Fixing
    }

    pub fn dry_run(&self) -> bool {
        self.handle.dry_run
    }

    /// The branch the rendered changes are committed to.
    ///
    /// When fixing, this is the base branch, which is itself the update
    /// branch of an earlier run.
    pub fn update_branch_name(&mut self, template: &TemplateHandle) -> Result<String> {
        if self.fixing() {
            return self.handle.base_branch();
        }
        Ok(update_branch_name(
            &self.branch_prefix,
            &self.branch_separator,
            template.name(),
            template.head(),
        ))
    }

    /// Prefix shared by every update branch this template has created here,
    /// ending in the separator.
    pub fn stale_branch_prefix(&self, template: &TemplateHandle) -> String {
        let sep = &self.branch_separator;
        format!("{}{}{}{}", self.branch_prefix, sep, template.name(), sep)
    }

    pub fn answers_file_path(&self) -> PathBuf {
        self.handle.clone_path().join(&self.answers_file)
    }

    /// Template commit recorded in the committed answers file.
    pub fn template_version(&self) -> Result<Option<String>> {
        render::read_template_version(&self.answers_file_path())
    }

    /// Whether the template should be applied, given the remote branches and
    /// the recorded template version.
    pub fn needs_update(&mut self, template: &TemplateHandle) -> Result<bool> {
        let branch = self.update_branch_name(template)?;
        if self.handle.has_branch(&branch)? {
            log::debug!(target: self.handle.log_target(), "SKIP: update branch exists: {}", branch);
            return Ok(false);
        }
        match self.template_version()? {
            Some(version) if version_matches(&version, template.head()) => {
                log::info!(
                    target: self.handle.log_target(),
                    "SKIP: template version matches template head: {}",
                    version
                );
                Ok(false)
            }
            Some(_) => Ok(true),
            None => {
                log::debug!(
                    target: self.handle.log_target(),
                    "no template version recorded in {}, force update",
                    self.answers_file
                );
                Ok(true)
            }
        }
    }

    pub fn commit_message(&self, template: &TemplateHandle) -> String {
        commit_message(
            self.operation,
            template.name(),
            template.base_branch(),
            template.head(),
        )
    }

    /// Whether the working tree holds anything worth a pull request.
    pub fn confirm_changes(&self) -> Result<bool> {
        let changes = self.handle.git().changed_paths(self.handle.clone_path())?;
        let meaningful = meaningful_changes(&changes, &self.answers_file);
        if changes.is_empty() {
            log::info!(target: self.handle.log_target(), "no changes detected");
        } else if !meaningful {
            log::info!(target: self.handle.log_target(), "only the answers file changed; nothing to do.");
        }
        Ok(meaningful)
    }
}

/// `<prefix><sep><template><sep><head>`
pub fn update_branch_name(prefix: &str, separator: &str, template: &str, head: &str) -> String {
    [prefix, template, head].join(separator)
}

/// A recorded version matches when it is a non-empty prefix of the head
/// commit, so abbreviated hashes still count.
pub fn version_matches(recorded: &str, head: &str) -> bool {
    !recorded.is_empty() && head.starts_with(recorded)
}

/// False for no changes, or when the answers file is the only change.
pub fn meaningful_changes(changes: &[String], answers_file: &str) -> bool {
    match changes {
        [] => false,
        [only] => only != answers_file,
        _ => true,
    }
}

pub fn commit_message(operation: Operation, template: &str, branch: &str, commit: &str) -> String {
    format!(
        "{operation} template {template}\n\ntemplate: {template}\nbranch: {branch}\ncommit: {commit}"
    )
}

/// Split a commit message into a pull request title and body. The blank
/// second line is dropped.
pub fn pull_request_text(message: &str) -> (String, String) {
    let lines: Vec<&str> = message.split('\n').collect();
    let title = lines.first().copied().unwrap_or_default().to_string();
    let body = lines.get(2..).map(|rest| rest.join("\n")).unwrap_or_default();
    (title, body)
}
