//! # Repository Handles
//!
//! This module provides [`RepositoryHandle`], the one type that wraps a
//! version-controlled repository: its on-disk clone under the clone root and
//! its remote on the hosting platform. Templates and target repositories
//! both hold a handle rather than extending one.
//!
//! ## Design
//!
//! Local git work goes through the [`GitOperations`] trait and remote work
//! through [`HostingPlatform`](crate::github::HostingPlatform). In the
//! application, [`DefaultGitOperations`] wraps the system `git` command; in
//! tests both are replaced with recording fakes so the clone and branch
//! logic can be exercised without network access.
//!
//! Remote state the handle needs more than once (the branch list, the
//! repository metadata, the resolved base branch and the checked-out branch)
//! is stored in explicit `Option` fields and fetched on first use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};
use crate::github::{Branch, HostingPlatform, RemoteRepo, RepoId};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Shallow-clone (depth 1) `url` into `target_dir`.
    fn clone_shallow(&self, url: &str, target_dir: &Path) -> Result<()>;

    fn current_branch(&self, dir: &Path) -> Result<String>;

    /// Whether the working tree has uncommitted changes against HEAD.
    fn is_dirty(&self, dir: &Path) -> Result<bool>;

    /// Restrict `origin` to `branch`, fetch it shallowly and check it out.
    fn fetch_and_checkout(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Create `branch` from HEAD and check it out.
    fn create_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Paths changed in the working tree, untracked files included.
    fn changed_paths(&self, dir: &Path) -> Result<Vec<String>>;

    /// Push `branch` to origin and set it as the upstream.
    fn publish_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    fn commit_all(&self, dir: &Path, message: &str) -> Result<()>;

    fn push(&self, dir: &Path) -> Result<()>;

    fn delete_remote_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Read a global git config value, `None` when unset.
    fn config_get(&self, key: &str) -> Result<Option<String>>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_shallow(&self, url: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone_shallow(url, target_dir)
    }

    fn current_branch(&self, dir: &Path) -> Result<String> {
        crate::git::current_branch(dir)
    }

    fn is_dirty(&self, dir: &Path) -> Result<bool> {
        crate::git::is_dirty(dir)
    }

    fn fetch_and_checkout(&self, dir: &Path, branch: &str) -> Result<()> {
        crate::git::fetch_and_checkout(dir, branch)
    }

    fn create_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        crate::git::create_branch(dir, branch)
    }

    fn changed_paths(&self, dir: &Path) -> Result<Vec<String>> {
        crate::git::changed_paths(dir)
    }

    fn publish_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        crate::git::publish_branch(dir, branch)
    }

    fn commit_all(&self, dir: &Path, message: &str) -> Result<()> {
        crate::git::commit_all(dir, message)
    }

    fn push(&self, dir: &Path) -> Result<()> {
        crate::git::push(dir)
    }

    fn delete_remote_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        crate::git::delete_remote_branch(dir, branch)
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        crate::git::config_get(key)
    }
}

/// A repository's local clone plus its remote on the hosting platform.
pub struct RepositoryHandle {
    id: RepoId,
    token: String,
    clone_root: PathBuf,
    clone_path: PathBuf,
    base_branch_override: Option<String>,
    pub dry_run: bool,
    pub interactive: bool,
    log_target: String,
    git: Arc<dyn GitOperations>,
    platform: Arc<dyn HostingPlatform>,
    // fetched on first use
    remote: Option<RemoteRepo>,
    branches: Option<Vec<Branch>>,
    base_branch: Option<String>,
    active_branch: Option<String>,
}

impl RepositoryHandle {
    pub fn new(
        id: RepoId,
        token: impl Into<String>,
        clone_root: impl Into<PathBuf>,
        git: Arc<dyn GitOperations>,
        platform: Arc<dyn HostingPlatform>,
    ) -> Self {
        let clone_root = clone_root.into();
        let clone_path = clone_root.join(&id.name);
        let log_target = format!("filesync::repo::{}", id.name);
        Self {
            id,
            token: token.into(),
            clone_root,
            clone_path,
            base_branch_override: None,
            dry_run: false,
            interactive: false,
            log_target,
            git,
            platform,
            remote: None,
            branches: None,
            base_branch: None,
            active_branch: None,
        }
    }

    /// Use `branch` as the base branch instead of discovering main/master.
    pub fn with_base_branch(mut self, branch: Option<String>) -> Self {
        self.base_branch_override = branch;
        self.base_branch = None;
        self
    }

    pub fn with_flags(mut self, dry_run: bool, interactive: bool) -> Self {
        self.dry_run = dry_run;
        self.interactive = interactive;
        self
    }

    /// Log under `target` instead of `filesync::repo::<name>`.
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn id(&self) -> &RepoId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn clone_root(&self) -> &Path {
        &self.clone_root
    }

    pub fn clone_path(&self) -> &Path {
        &self.clone_path
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    pub fn git(&self) -> &dyn GitOperations {
        self.git.as_ref()
    }

    pub fn platform(&self) -> &dyn HostingPlatform {
        self.platform.as_ref()
    }

    /// Replace the base branch override; the next read resolves again.
    pub fn set_base_branch(&mut self, branch: impl Into<String>) {
        self.base_branch_override = Some(branch.into());
        self.base_branch = None;
    }

    /// Remote branches, listed once per handle.
    pub fn branches(&mut self) -> Result<&[Branch]> {
        if self.branches.is_none() {
            log::debug!(target: self.log_target.as_str(), "listing branches of {}", self.id.full_name());
            self.branches = Some(self.platform.list_branches(&self.id)?);
        }
        Ok(self.branches.as_deref().unwrap_or_default())
    }

    pub fn has_branch(&mut self, name: &str) -> Result<bool> {
        Ok(self.branches()?.iter().any(|b| b.name == name))
    }

    /// `main` if it exists, else `master`.
    pub fn main(&mut self) -> Result<String> {
        for candidate in ["main", "master"] {
            if self.has_branch(candidate)? {
                return Ok(candidate.to_string());
            }
        }
        Err(Error::UnrecognizableBaseBranch {
            name: self.id.full_name(),
            what: "base branch".to_string(),
        })
    }

    /// The override if one is set, otherwise [`main`](Self::main).
    pub fn base_branch(&mut self) -> Result<String> {
        if let Some(branch) = &self.base_branch {
            return Ok(branch.clone());
        }
        let branch = match &self.base_branch_override {
            Some(branch) => branch.clone(),
            None => self.main()?,
        };
        self.base_branch = Some(branch.clone());
        Ok(branch)
    }

    /// The branch checked out in the local clone.
    pub fn active_branch(&mut self) -> Result<String> {
        if let Some(branch) = &self.active_branch {
            return Ok(branch.clone());
        }
        let branch = self
            .git
            .current_branch(&self.clone_path)
            .map_err(|_| Error::UnrecognizableBaseBranch {
                name: self.id.full_name(),
                what: "active branch".to_string(),
            })?;
        self.active_branch = Some(branch.clone());
        Ok(branch)
    }

    /// Commit at the tip of the remote base branch.
    pub fn head(&mut self) -> Result<String> {
        let base = self.base_branch()?;
        Ok(self.platform.get_branch(&self.id, &base)?.sha)
    }

    pub fn is_cloned(&self) -> bool {
        self.clone_path.exists()
    }

    pub fn is_dirty(&self) -> Result<bool> {
        self.git.is_dirty(&self.clone_path)
    }

    /// HTTPS clone URL with the token as userinfo.
    pub fn clone_url(&mut self) -> Result<String> {
        if self.remote.is_none() {
            self.remote = Some(self.platform.get_repo(&self.id)?);
        }
        let remote = self.remote.as_ref().map(|r| r.clone_url.as_str()).unwrap_or_default();
        let mut url = Url::parse(remote)?;
        url.set_username(&self.token).map_err(|_| Error::GitConfig {
            message: format!("cannot embed a credential in clone url for {}", self.id.full_name()),
        })?;
        Ok(url.to_string())
    }

    /// Make sure the clone exists, is clean and is on the base branch.
    ///
    /// Cloning is skipped when the directory already exists. A dirty clone is
    /// an error; nothing is stashed or reset.
    pub fn clone(&mut self) -> Result<()> {
        if !self.is_cloned() {
            log::debug!(
                target: self.log_target.as_str(),
                "cloning {} to {}...",
                self.id.full_name(),
                self.clone_path.display()
            );
            let url = self.clone_url()?;
            self.git.clone_shallow(&url, &self.clone_path)?;
            self.active_branch = None;
        }
        if self.is_dirty()? {
            return Err(Error::DirtyRepo {
                name: self.id.full_name(),
            });
        }
        self.maybe_switch_branch()?;
        log::debug!(target: self.log_target.as_str(), "cloning {} complete", self.id.full_name());
        Ok(())
    }

    /// Check out the base branch unless it already is the active branch.
    pub fn maybe_switch_branch(&mut self) -> Result<()> {
        let base = self.base_branch()?;
        let active = self.active_branch()?;
        if active == base {
            return Ok(());
        }
        log::info!(target: self.log_target.as_str(), "switching from {} to {}", active, base);
        self.git.fetch_and_checkout(&self.clone_path, &base)?;
        self.active_branch = Some(base);
        Ok(())
    }

    /// Create `branch` locally and check it out.
    pub fn create_branch(&mut self, branch: &str) -> Result<()> {
        self.git.create_branch(&self.clone_path, branch)?;
        self.active_branch = Some(branch.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockGit, MockPlatform};
    use tempfile::TempDir;

    fn handle(root: &Path, git: Arc<MockGit>, platform: Arc<MockPlatform>) -> RepositoryHandle {
        RepositoryHandle::new(RepoId::new("acme", "widgets"), "t0k3n", root, git, platform)
    }

    #[test]
    fn test_clone_path_is_root_plus_name() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new());
        let repo = handle(Path::new("/clones"), git, platform);
        assert_eq!(repo.clone_path(), Path::new("/clones/widgets"));
    }

    #[test]
    fn test_main_prefers_main() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["master", "main"]));
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert_eq!(repo.main().unwrap(), "main");
    }

    #[test]
    fn test_main_falls_back_to_master() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["master", "dev"]));
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert_eq!(repo.base_branch().unwrap(), "master");
    }

    #[test]
    fn test_main_unrecognizable() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["trunk"]));
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert!(matches!(
            repo.base_branch().unwrap_err(),
            Error::UnrecognizableBaseBranch { .. }
        ));
    }

    #[test]
    fn test_branches_listed_once() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["main"]));
        let mut repo = handle(Path::new("/clones"), git, platform.clone());
        repo.has_branch("main").unwrap();
        repo.has_branch("other").unwrap();
        repo.main().unwrap();
        assert_eq!(platform.count_calls("list_branches"), 1);
    }

    #[test]
    fn test_override_wins_over_main() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["main"]));
        let mut repo = handle(Path::new("/clones"), git, platform.clone())
            .with_base_branch(Some("release".to_string()));
        assert_eq!(repo.base_branch().unwrap(), "release");
        assert_eq!(platform.count_calls("list_branches"), 0);
    }

    #[test]
    fn test_clone_url_embeds_token() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_repo("acme", "widgets"));
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert_eq!(
            repo.clone_url().unwrap(),
            "https://t0k3n@github.com/acme/widgets.git"
        );
    }

    #[test]
    fn test_clone_fresh() {
        let root = TempDir::new().unwrap();
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(
            MockPlatform::new()
                .with_repo("acme", "widgets")
                .with_branches("acme/widgets", &["main"]),
        );
        let mut repo = handle(root.path(), git.clone(), platform);
        repo.clone().unwrap();
        assert!(repo.is_cloned());
        assert_eq!(git.count_calls("clone_shallow"), 1);
        assert_eq!(git.count_calls("fetch_and_checkout"), 0);
    }

    #[test]
    fn test_clone_is_idempotent() {
        let root = TempDir::new().unwrap();
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(
            MockPlatform::new()
                .with_repo("acme", "widgets")
                .with_branches("acme/widgets", &["main"]),
        );
        let mut repo = handle(root.path(), git.clone(), platform);
        repo.clone().unwrap();
        repo.clone().unwrap();
        assert_eq!(git.count_calls("clone_shallow"), 1);
    }

    #[test]
    fn test_clone_dirty_fails() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("widgets")).unwrap();
        let git = Arc::new(MockGit::new().dirty());
        let platform = Arc::new(MockPlatform::new().with_branches("acme/widgets", &["main"]));
        let mut repo = handle(root.path(), git.clone(), platform);
        assert!(matches!(repo.clone().unwrap_err(), Error::DirtyRepo { .. }));
        assert_eq!(git.count_calls("clone_shallow"), 0);
        assert_eq!(git.count_calls("fetch_and_checkout"), 0);
    }

    #[test]
    fn test_clone_switches_to_override_branch() {
        let root = TempDir::new().unwrap();
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(MockPlatform::new().with_repo("acme", "widgets"));
        let mut repo = handle(root.path(), git.clone(), platform)
            .with_base_branch(Some("filesync/tpl/abc".to_string()));
        repo.clone().unwrap();
        assert!(git
            .calls()
            .contains(&"fetch_and_checkout filesync/tpl/abc".to_string()));
        assert_eq!(repo.active_branch().unwrap(), "filesync/tpl/abc");
    }

    #[test]
    fn test_active_branch_failure_is_unrecognizable() {
        let git = Arc::new(MockGit::new().failing("current_branch"));
        let platform = Arc::new(MockPlatform::new());
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert!(matches!(
            repo.active_branch().unwrap_err(),
            Error::UnrecognizableBaseBranch { .. }
        ));
    }

    #[test]
    fn test_head_reads_base_branch_tip() {
        let git = Arc::new(MockGit::new());
        let platform = Arc::new(
            MockPlatform::new().with_branch_shas("acme/widgets", &[("main", "a1b2c3")]),
        );
        let mut repo = handle(Path::new("/clones"), git, platform);
        assert_eq!(repo.head().unwrap(), "a1b2c3");
    }
}
