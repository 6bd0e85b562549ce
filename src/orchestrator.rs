//! # Update Orchestration
//!
//! [`Orchestrator::run`] drives one target repository through its lifecycle:
//!
//! 1. clone (or reuse) the target and put it on its base branch,
//! 2. check out the update branch (fixing stays on the base branch),
//! 3. when updating, stop if an update for this template head is already
//!    pushed or the repository already records it,
//! 4. render the template and rewrite the answers file,
//! 5. stop if nothing but the answers file changed,
//! 6. close and delete update branches left by older template heads,
//! 7. commit and push,
//! 8. open a pull request (fixing reuses the existing one).
//!
//! Hooks run around clone, render and push. A failing hook, like any other
//! error, aborts the repository; the two early stops are successes.
//!
//! In dry-run mode everything up to and including the render happens, but
//! nothing is pushed, closed, deleted or opened on the remote.

use log::Level;

use crate::error::Result;
use crate::github::NewPullRequest;
use crate::hooks::{self, HookContext, HookSlot};
use crate::output::Reporter;
use crate::render::{self, RenderRequest, Renderer};
use crate::target::{self, Operation, TargetRepository};
use crate::template::TemplateHandle;

/// How a target's lifecycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The template head is already applied or already has a branch.
    UpToDate,
    /// Rendering changed nothing beyond the answers file.
    NoChanges,
    /// Changes were shipped (or would have been, in dry-run mode).
    Completed { pull_request: Option<String> },
}

pub struct Orchestrator<'a> {
    template: &'a TemplateHandle,
    renderer: &'a dyn Renderer,
    reporter: &'a Reporter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(template: &'a TemplateHandle, renderer: &'a dyn Renderer, reporter: &'a Reporter) -> Self {
        Self {
            template,
            renderer,
            reporter,
        }
    }

    pub fn run(&self, target: &mut TargetRepository) -> Result<Outcome> {
        let log_target = target.handle.log_target().to_string();
        log::info!(target: log_target.as_str(), "{} {}...", target.operation, target.name());

        self.hook(target, HookSlot::PreClone)?;
        target.handle.clone()?;
        self.hook(target, HookSlot::PostClone)?;

        self.switch_to_update_branch(target)?;
        self.hook(target, HookSlot::PreRender)?;
        if target.operation == Operation::Updating && !target.needs_update(self.template)? {
            return Ok(Outcome::UpToDate);
        }

        self.render(target)?;
        self.hook(target, HookSlot::PostRender)?;
        if !target.confirm_changes()? {
            return Ok(Outcome::NoChanges);
        }

        self.hook(target, HookSlot::PrePush)?;
        if !target.fixing() {
            self.clean_stale_branches(target)?;
        }
        self.push_changes(target)?;
        let pull_request = self.open_pull_request(target)?;
        self.hook(target, HookSlot::PostPush)?;

        log::info!(target: log_target.as_str(), "{} complete", target.name());
        Ok(Outcome::Completed { pull_request })
    }

    fn hook(&self, target: &TargetRepository, slot: HookSlot) -> Result<()> {
        let ctx = HookContext {
            template_dir: self.template.clone_path(),
            operation: target.operation.as_str(),
            clone_root: target.handle.clone_root(),
            repo_name: target.name(),
            answers_file: &target.answers_file,
            log_target: target.handle.log_target(),
        };
        hooks::run_hook(slot, &target.hooks, &ctx)?;
        Ok(())
    }

    fn switch_to_update_branch(&self, target: &mut TargetRepository) -> Result<()> {
        if target.fixing() {
            return Ok(());
        }
        let branch = target.update_branch_name(self.template)?;
        log::debug!(target: target.handle.log_target(), "switch to update branch {}", branch);
        target.handle.create_branch(&branch)
    }

    fn render(&self, target: &TargetRepository) -> Result<()> {
        let interactive = target.handle.interactive;
        let request = RenderRequest {
            source: self.template.clone_path(),
            destination: target.handle.clone_path(),
            answers_file: &target.answers_file,
            force: !interactive,
            quiet: !interactive && !target.dry_run(),
            vcs_ref: self.template.vcs_ref(),
            interactive,
        };
        log::debug!(
            target: target.handle.log_target(),
            "running copier to apply template: {} -> {} (answers_file={}, force={}, quiet={}, vcs_ref={})",
            request.source.display(),
            request.destination.display(),
            request.answers_file,
            request.force,
            request.quiet,
            request.vcs_ref
        );
        self.renderer.render(&request)?;

        let answers = target.answers_file_path();
        if answers.exists() {
            render::munge_answers(&answers)?;
        } else {
            log::warn!(
                target: target.handle.log_target(),
                "renderer did not write {}",
                target.answers_file
            );
        }
        log::debug!(target: target.handle.log_target(), "copier done");
        Ok(())
    }

    /// Close the pull requests of, and delete, every remote branch this
    /// template created for an earlier head.
    fn clean_stale_branches(&self, target: &mut TargetRepository) -> Result<()> {
        let prefix = target.stale_branch_prefix(self.template);
        let log_target = target.handle.log_target().to_string();
        log::debug!(target: log_target.as_str(), "clean old branches matching prefix {}...", prefix);

        let stale: Vec<_> = target
            .handle
            .branches()?
            .iter()
            .filter(|b| b.name.starts_with(&prefix))
            .cloned()
            .collect();
        let dry_run = target.dry_run();
        let id = target.handle.id().clone();
        for branch in stale {
            for pull in target.handle.platform().pulls_for_commit(&id, &branch.sha)? {
                log::debug!(target: log_target.as_str(), "close PR #{}: {}", pull.number, pull.title);
                if !dry_run {
                    target.handle.platform().close_pull(&id, pull.number)?;
                }
            }
            log::debug!(target: log_target.as_str(), "delete branch {}", branch.name);
            if !dry_run {
                target
                    .handle
                    .git()
                    .delete_remote_branch(target.handle.clone_path(), &branch.name)?;
            }
        }
        log::debug!(target: log_target.as_str(), "clean complete");
        Ok(())
    }

    fn push_changes(&self, target: &mut TargetRepository) -> Result<()> {
        let message = target.commit_message(self.template);
        log::debug!(target: target.handle.log_target(), "push changes with message\n{}", message);
        if target.dry_run() {
            return Ok(());
        }
        let branch = target.update_branch_name(self.template)?;
        let dir = target.handle.clone_path();
        let git = target.handle.git();
        git.publish_branch(dir, &branch)?;
        git.commit_all(dir, &message)?;
        git.push(dir)
    }

    /// Open the pull request and report its URL. Returns `None` in dry-run
    /// mode, or when fixing and no pull request is attached to the branch.
    fn open_pull_request(&self, target: &mut TargetRepository) -> Result<Option<String>> {
        let log_target = target.handle.log_target().to_string();
        let url = if target.fixing() {
            // the pull request already exists; find it
            let head = target.handle.head()?;
            let id = target.handle.id().clone();
            let pulls = target.handle.platform().pulls_for_commit(&id, &head)?;
            match pulls.into_iter().next() {
                Some(pull) => pull.html_url,
                None => {
                    log::warn!(target: log_target.as_str(), "no pull request found for commit {}", head);
                    return Ok(None);
                }
            }
        } else {
            let (title, body) = target::pull_request_text(&target.commit_message(self.template));
            let head = target.update_branch_name(self.template)?;
            let base = target.handle.base_branch()?;
            log::debug!(target: log_target.as_str(), "open PR to merge {} into {}", head, base);
            if target.dry_run() {
                return Ok(None);
            }
            let pull = NewPullRequest {
                title,
                body,
                head,
                base,
            };
            target
                .handle
                .platform()
                .create_pull(target.handle.id(), &pull)?
                .html_url
        };
        self.reporter.with_target(log_target).report(Level::Info, &url);
        Ok(Some(url))
    }
}
