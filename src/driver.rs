//! # Run Driver
//!
//! [`FileSync`] sequences a whole invocation: it validates the environment,
//! opens the template, works out which repositories to process, runs the
//! [`Orchestrator`] on each, and removes the clone root at the end when
//! autoclean is on.
//!
//! ## Failure policy
//!
//! Startup and configuration errors stop the run. While updating a list of
//! repositories, an error in one repository is logged and the loop moves on;
//! when a single repository was named (`onboard`, `fix`, or `update
//! --single-repo`) its error stops the run. Either way, a run that stops
//! early still cleans up.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::{resolve_repo, split_org_and_name, RunConfig};
use crate::defaults;
use crate::error::{Error, Result};
use crate::github::{ContentProbe, GitHubClient, HostingPlatform, RepoId};
use crate::orchestrator::{Orchestrator, Outcome};
use crate::output::{OutputConfig, Reporter};
use crate::render::{CopierRenderer, Renderer};
use crate::repository::{DefaultGitOperations, GitOperations, RepositoryHandle};
use crate::target::{Operation, TargetRepository};
use crate::template::TemplateHandle;

pub const LOG_TARGET: &str = "filesync";

/// Per-repository results of an `update` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    /// Repository name and error message.
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    fn record(&mut self, name: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Completed { .. } => self.completed.push(name.to_string()),
            Outcome::UpToDate | Outcome::NoChanges => self.skipped.push(name.to_string()),
        }
    }
}

pub struct FileSync {
    config: RunConfig,
    operation: Operation,
    token: String,
    git: Arc<dyn GitOperations>,
    platform: Arc<dyn HostingPlatform>,
    renderer: Box<dyn Renderer>,
    reporter: Reporter,
    today: NaiveDate,
    template: Option<TemplateHandle>,
}

impl FileSync {
    /// Build a driver that talks to GitHub, runs `git` and renders with
    /// `copier`. Fails when the token variable is not set.
    pub fn new(config: RunConfig, operation: Operation, output: OutputConfig) -> Result<Self> {
        let token = read_token(&config.token_variable_name, |key| std::env::var(key).ok())?;
        let platform: Arc<dyn HostingPlatform> = Arc::new(GitHubClient::new(token.clone()));
        Ok(Self::with_collaborators(
            config,
            operation,
            token,
            Arc::new(DefaultGitOperations),
            platform,
            Box::new(CopierRenderer::new()),
            output,
        ))
    }

    pub fn with_collaborators(
        config: RunConfig,
        operation: Operation,
        token: impl Into<String>,
        git: Arc<dyn GitOperations>,
        platform: Arc<dyn HostingPlatform>,
        renderer: Box<dyn Renderer>,
        output: OutputConfig,
    ) -> Self {
        Self {
            config,
            operation,
            token: token.into(),
            git,
            platform,
            renderer,
            reporter: Reporter::new(LOG_TARGET, output),
            today: Local::now().date_naive(),
            template: None,
        }
    }

    /// Use `today` for shard selection instead of the current date.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Log the startup banner, validate the git identity, create the clone
    /// root and open the template.
    pub fn start(&mut self) -> Result<()> {
        log::info!(target: LOG_TARGET, "Version: {}", env!("CARGO_PKG_VERSION"));
        if self.config.dry_run {
            self.reporter.dry_run_banner();
        }
        log::info!(target: LOG_TARGET, "started {}", self.operation);
        log::debug!(target: LOG_TARGET, "with config: {:?}", self.config);

        let result = validate_git_identity(self.git.as_ref(), |key| std::env::var(key).ok())
            .and_then(|_| self.create_clone_root())
            .and_then(|_| self.build_template());
        match result {
            Ok(template) => {
                self.template = Some(template);
                Ok(())
            }
            Err(error) => Err(self.die(error)),
        }
    }

    fn create_clone_root(&self) -> Result<()> {
        log::debug!(target: LOG_TARGET, "setting up clone-root: {}", self.config.clone_root.display());
        fs::create_dir_all(&self.config.clone_root)?;
        Ok(())
    }

    fn build_template(&self) -> Result<TemplateHandle> {
        let (org, name) = split_org_and_name(&self.config.template, None)?;
        let repo = RepositoryHandle::new(
            RepoId::new(org, name),
            self.token.clone(),
            &self.config.clone_root,
            self.git.clone(),
            self.platform.clone(),
        )
        .with_base_branch(self.config.template_branch.clone())
        .with_flags(self.config.dry_run, self.config.interactive);
        TemplateHandle::open(repo, &self.config.template_config, self.operation)
    }

    fn template(&self) -> Result<&TemplateHandle> {
        self.template.as_ref().ok_or_else(|| Error::MissingRequiredConfig {
            message: "the template has not been loaded".to_string(),
        })
    }

    /// Build the target for `name`, optionally forcing its base branch.
    pub fn build_target(&self, name: &str, base_branch: Option<String>) -> Result<TargetRepository> {
        let template = self.template()?;
        let mut settings = resolve_repo(template.config(), &self.config, name)?;
        if base_branch.is_some() {
            settings.base_branch = base_branch;
        }
        let handle = RepositoryHandle::new(
            RepoId::new(settings.org.clone(), settings.name.clone()),
            self.token.clone(),
            &self.config.clone_root,
            self.git.clone(),
            self.platform.clone(),
        );
        Ok(TargetRepository::new(handle, settings, self.operation))
    }

    /// Names from the template's `repos:` list plus, with autoscan, every
    /// onboarded repository in the org.
    pub fn fetch_repo_list(&self) -> Result<Vec<String>> {
        let template = self.template()?;
        let config = template.config();
        let mut names = config.repo_names();
        if !config.autoscan {
            return Ok(names);
        }

        let answers_paths = config.answers_file_paths();
        for repo in self.platform.list_org_repos(template.org())? {
            if repo.fork {
                log::debug!(target: LOG_TARGET, "skipping {}; it's a fork", repo.name);
                continue;
            }
            if repo.archived {
                log::debug!(target: LOG_TARGET, "skipping {}; it's archived", repo.name);
                continue;
            }
            if repo.name == template.name() {
                log::debug!(target: LOG_TARGET, "skipping {}; it's the template!", repo.name);
                continue;
            }
            let id = RepoId::new(template.org(), repo.name.clone());
            if !self.has_answers_file(&id, &answers_paths)? {
                log::debug!(target: LOG_TARGET, "skipping {}; no answersfile", repo.name);
                continue;
            }
            log::debug!(target: LOG_TARGET, "adding {} to repo list", repo.name);
            names.push(repo.name);
        }

        let mut seen = HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        Ok(names)
    }

    fn has_answers_file(&self, repo: &RepoId, paths: &[String]) -> Result<bool> {
        for path in paths {
            if self.platform.probe_content(repo, path)? == ContentProbe::Found {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The targets of an `update` run, sharded when the template asks for it.
    pub fn build_repo_list(&self, cache: Option<&Path>) -> Result<Vec<String>> {
        log::debug!(target: LOG_TARGET, "initializing repos...");
        let names = match cache {
            Some(path) => read_repo_list_from_cache(path)?,
            None => self.fetch_repo_list()?,
        };
        let names = match self.template()?.config().shard {
            Some(shard) => {
                log::debug!(target: LOG_TARGET, "sharding repo list...");
                shard.select(&names, self.today)
            }
            None => names,
        };
        log::debug!(target: LOG_TARGET, "repo initialization complete");
        Ok(names)
    }

    /// Apply the template to every target, or to `single_repo` only.
    pub fn update(&mut self, single_repo: Option<&str>, cache: Option<&Path>) -> Result<RunSummary> {
        self.start()?;
        let names = match single_repo {
            Some(name) => vec![name.to_string()],
            None => self.build_repo_list(cache).map_err(|e| self.die(e))?,
        };
        // resolve every target up front so configuration errors stop the
        // run before any repository is touched
        let targets = names
            .iter()
            .map(|name| self.build_target(name, None))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| self.die(e))?;

        let mut summary = RunSummary::default();
        {
            let template = self.template()?;
            let orchestrator = Orchestrator::new(template, self.renderer.as_ref(), &self.reporter);
            for mut target in targets {
                match orchestrator.run(&mut target) {
                    Ok(outcome) => summary.record(target.name(), &outcome),
                    Err(error) if single_repo.is_some() => {
                        return Err(self.die(error));
                    }
                    Err(error) => {
                        log::error!(
                            target: LOG_TARGET,
                            "repo {} failed with exception: {}",
                            target.name(),
                            error
                        );
                        summary.failed.push((target.name().to_string(), error.to_string()));
                    }
                }
            }
        }
        log::info!(
            target: LOG_TARGET,
            "{} updated, {} skipped, {} failed",
            summary.completed.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        self.stop();
        Ok(summary)
    }

    /// Apply the template to `repo` for the first time.
    pub fn onboard(&mut self, repo: &str) -> Result<Outcome> {
        self.run_single(repo, None)
    }

    /// Re-render onto `branch`, an update branch with an open pull request.
    pub fn fix(&mut self, repo: &str, branch: &str) -> Result<Outcome> {
        self.run_single(repo, Some(branch.to_string()))
    }

    fn run_single(&mut self, repo: &str, base_branch: Option<String>) -> Result<Outcome> {
        self.start()?;
        let outcome = self
            .build_target(repo, base_branch)
            .and_then(|mut target| {
                let template = self.template()?;
                Orchestrator::new(template, self.renderer.as_ref(), &self.reporter).run(&mut target)
            })
            .map_err(|e| self.die(e))?;
        self.stop();
        Ok(outcome)
    }

    fn stop(&self) {
        self.maybe_clean();
        log::info!(target: LOG_TARGET, "finished!");
    }

    /// Log a fatal error and clean up; the caller returns the error.
    fn die(&self, error: Error) -> Error {
        log::error!(target: LOG_TARGET, "{}", error);
        self.maybe_clean();
        error
    }

    pub fn maybe_clean(&self) {
        clean_clone_root(&self.config.clone_root, self.config.autoclean);
    }
}

/// Remove `clone_root` when autoclean is on. Failures are logged only.
pub fn clean_clone_root(clone_root: &Path, autoclean: bool) {
    if !autoclean || !clone_root.exists() {
        return;
    }
    log::info!(target: LOG_TARGET, "cleaning up {}", clone_root.display());
    if let Err(e) = fs::remove_dir_all(clone_root) {
        log::warn!(target: LOG_TARGET, "failed to remove {}: {}", clone_root.display(), e);
    }
}

/// On Ctrl-C, clean the clone root (if autoclean is on) and exit with the
/// conventional interrupt status.
pub fn install_interrupt_handler(config: &RunConfig) -> Result<()> {
    let clone_root: PathBuf = config.clone_root.clone();
    let autoclean = config.autoclean;
    ctrlc::set_handler(move || {
        eprintln!();
        log::warn!(target: LOG_TARGET, "interrupted");
        clean_clone_root(&clone_root, autoclean);
        std::process::exit(130);
    })
    .map_err(|e| Error::Io(std::io::Error::other(e)))
}

/// Read the token from the variable named `variable`.
pub fn read_token(variable: &str, env: impl Fn(&str) -> Option<String>) -> Result<String> {
    match env(variable) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(Error::GitConfig {
            message: format!("No token found! Is token-variable-name {} correct?", variable),
        }),
    }
}

/// Require a committer identity, from the environment or from git config.
pub fn validate_git_identity(
    git: &dyn GitOperations,
    env: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    log::debug!(target: LOG_TARGET, "validating filesync config...");
    if defaults::GIT_IDENTITY_VARS.iter().all(|var| env(var).is_some()) {
        return Ok(());
    }
    for key in ["user.email", "user.name"] {
        if git.config_get(key)?.is_none() {
            return Err(Error::GitConfig {
                message: format!(
                    "No git config found! Set the following variables or see man git-config:\n{}",
                    defaults::GIT_IDENTITY_VARS.join(",")
                ),
            });
        }
    }
    log::debug!(target: LOG_TARGET, "validation ok");
    Ok(())
}

/// Repository names from a cache file, one per line; blank lines are
/// ignored.
pub fn read_repo_list_from_cache(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
