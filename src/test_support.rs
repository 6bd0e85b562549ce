//! Recording fakes for the git, hosting-platform and renderer seams.
//!
//! Each fake appends one line per call (`"<method> <args>"`) to a shared
//! log so tests can assert on what was, and was not, attempted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::github::{
    Branch, ContentProbe, HostingPlatform, NewPullRequest, PullRequest, RemoteRepo, RepoId,
};
use crate::render::{RenderRequest, Renderer};
use crate::repository::GitOperations;

fn injected(method: &str) -> Error {
    Error::GitCommand {
        command: method.to_string(),
        dir: String::new(),
        stderr: "injected failure".to_string(),
    }
}

pub struct MockGit {
    calls: Arc<Mutex<Vec<String>>>,
    branch: Mutex<String>,
    dirty: bool,
    changes: Vec<String>,
    fail_on: Option<String>,
    identity: bool,
    /// Files written into the clone directory by `clone_shallow`.
    files: Vec<(String, String)>,
}

impl MockGit {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            branch: Mutex::new("main".to_string()),
            dirty: false,
            changes: Vec::new(),
            fail_on: None,
            identity: true,
            files: Vec::new(),
        }
    }

    /// Report no `user.name`/`user.email` in git config.
    pub fn without_identity(mut self) -> Self {
        self.identity = false;
        self
    }

    pub fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    pub fn on_branch(self, branch: &str) -> Self {
        *self.branch.lock().unwrap() = branch.to_string();
        self
    }

    pub fn with_changes(mut self, changes: &[&str]) -> Self {
        self.changes = changes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    pub fn failing(mut self, method: &str) -> Self {
        self.fail_on = Some(method.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    fn record(&self, method: &str, args: &[&str]) -> Result<()> {
        let mut line = method.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls.lock().unwrap().push(line);
        if self.fail_on.as_deref() == Some(method) {
            return Err(injected(method));
        }
        Ok(())
    }
}

impl GitOperations for MockGit {
    fn clone_shallow(&self, url: &str, target_dir: &Path) -> Result<()> {
        self.record("clone_shallow", &[url])?;
        fs::create_dir_all(target_dir)?;
        for (path, content) in &self.files {
            let full = target_dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full, content)?;
        }
        Ok(())
    }

    fn current_branch(&self, _dir: &Path) -> Result<String> {
        self.record("current_branch", &[])?;
        Ok(self.branch.lock().unwrap().clone())
    }

    fn is_dirty(&self, _dir: &Path) -> Result<bool> {
        self.record("is_dirty", &[])?;
        Ok(self.dirty)
    }

    fn fetch_and_checkout(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("fetch_and_checkout", &[branch])?;
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }

    fn create_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("create_branch", &[branch])?;
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }

    fn changed_paths(&self, _dir: &Path) -> Result<Vec<String>> {
        self.record("changed_paths", &[])?;
        Ok(self.changes.clone())
    }

    fn publish_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("publish_branch", &[branch])
    }

    fn commit_all(&self, _dir: &Path, message: &str) -> Result<()> {
        let first_line = message.lines().next().unwrap_or_default();
        self.record("commit_all", &[first_line])
    }

    fn push(&self, _dir: &Path) -> Result<()> {
        self.record("push", &[])
    }

    fn delete_remote_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("delete_remote_branch", &[branch])
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.record("config_get", &[key])?;
        Ok(self.identity.then(|| "filesync test".to_string()))
    }
}

pub struct MockPlatform {
    calls: Arc<Mutex<Vec<String>>>,
    repos: BTreeMap<String, RemoteRepo>,
    org_repos: BTreeMap<String, Vec<RemoteRepo>>,
    branches: BTreeMap<String, Vec<Branch>>,
    contents: BTreeSet<(String, String)>,
    content_error: Option<String>,
    pulls: BTreeMap<String, Vec<PullRequest>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            repos: BTreeMap::new(),
            org_repos: BTreeMap::new(),
            branches: BTreeMap::new(),
            contents: BTreeSet::new(),
            content_error: None,
            pulls: BTreeMap::new(),
        }
    }

    pub fn with_repo(mut self, org: &str, name: &str) -> Self {
        self.repos.insert(format!("{}/{}", org, name), remote(org, name));
        self
    }

    /// Add `names` as branches whose commit is `sha-<name>`.
    pub fn with_branches(mut self, full_name: &str, names: &[&str]) -> Self {
        let entry = self.branches.entry(full_name.to_string()).or_default();
        for name in names {
            entry.push(Branch {
                name: name.to_string(),
                sha: format!("sha-{}", name),
            });
        }
        self
    }

    pub fn with_branch_shas(mut self, full_name: &str, branches: &[(&str, &str)]) -> Self {
        let entry = self.branches.entry(full_name.to_string()).or_default();
        for (name, sha) in branches {
            entry.push(Branch {
                name: name.to_string(),
                sha: sha.to_string(),
            });
        }
        self
    }

    pub fn with_org_repo(mut self, org: &str, repo: RemoteRepo) -> Self {
        self.org_repos.entry(org.to_string()).or_default().push(repo);
        self
    }

    pub fn with_content(mut self, full_name: &str, path: &str) -> Self {
        self.contents.insert((full_name.to_string(), path.to_string()));
        self
    }

    /// Make every content probe of `full_name` fail with a 500.
    pub fn with_content_error(mut self, full_name: &str) -> Self {
        self.content_error = Some(full_name.to_string());
        self
    }

    pub fn with_pull(mut self, sha: &str, number: u64) -> Self {
        self.pulls.entry(sha.to_string()).or_default().push(PullRequest {
            number,
            title: format!("pull {}", number),
            html_url: format!("https://github.com/pulls/{}", number),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(method))
            .count()
    }

    fn record(&self, line: String) {
        self.calls.lock().unwrap().push(line);
    }
}

pub fn remote(org: &str, name: &str) -> RemoteRepo {
    RemoteRepo {
        name: name.to_string(),
        clone_url: format!("https://github.com/{}/{}.git", org, name),
        fork: false,
        archived: false,
    }
}

fn not_found(what: String) -> Error {
    Error::Api {
        method: "GET".to_string(),
        url: what,
        status: 404,
        message: "Not Found".to_string(),
    }
}

impl HostingPlatform for MockPlatform {
    fn get_repo(&self, repo: &RepoId) -> Result<RemoteRepo> {
        self.record(format!("get_repo {}", repo.full_name()));
        self.repos
            .get(&repo.full_name())
            .cloned()
            .ok_or_else(|| not_found(repo.full_name()))
    }

    fn list_org_repos(&self, org: &str) -> Result<Vec<RemoteRepo>> {
        self.record(format!("list_org_repos {}", org));
        Ok(self.org_repos.get(org).cloned().unwrap_or_default())
    }

    fn list_branches(&self, repo: &RepoId) -> Result<Vec<Branch>> {
        self.record(format!("list_branches {}", repo.full_name()));
        Ok(self.branches.get(&repo.full_name()).cloned().unwrap_or_default())
    }

    fn get_branch(&self, repo: &RepoId, branch: &str) -> Result<Branch> {
        self.record(format!("get_branch {} {}", repo.full_name(), branch));
        self.branches
            .get(&repo.full_name())
            .and_then(|list| list.iter().find(|b| b.name == branch))
            .cloned()
            .ok_or_else(|| not_found(format!("{}@{}", repo.full_name(), branch)))
    }

    fn probe_content(&self, repo: &RepoId, path: &str) -> Result<ContentProbe> {
        self.record(format!("probe_content {} {}", repo.full_name(), path));
        if self.content_error.as_deref() == Some(repo.full_name().as_str()) {
            return Err(Error::Api {
                method: "GET".to_string(),
                url: path.to_string(),
                status: 500,
                message: "boom".to_string(),
            });
        }
        if self.contents.contains(&(repo.full_name(), path.to_string())) {
            Ok(ContentProbe::Found)
        } else {
            Ok(ContentProbe::NotFound)
        }
    }

    fn create_pull(&self, repo: &RepoId, pull: &NewPullRequest) -> Result<PullRequest> {
        self.record(format!(
            "create_pull {} {} -> {}",
            repo.full_name(),
            pull.head,
            pull.base
        ));
        Ok(PullRequest {
            number: 1,
            title: pull.title.clone(),
            html_url: format!("https://github.com/{}/pull/1", repo.full_name()),
        })
    }

    fn pulls_for_commit(&self, repo: &RepoId, sha: &str) -> Result<Vec<PullRequest>> {
        self.record(format!("pulls_for_commit {} {}", repo.full_name(), sha));
        Ok(self.pulls.get(sha).cloned().unwrap_or_default())
    }

    fn close_pull(&self, repo: &RepoId, number: u64) -> Result<()> {
        self.record(format!("close_pull {} {}", repo.full_name(), number));
        Ok(())
    }
}

/// Renderer fake that writes a canned answers file into the destination.
pub struct MockRenderer {
    calls: Arc<Mutex<Vec<String>>>,
    answers: Option<String>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            answers: None,
        }
    }

    pub fn writing_answers(mut self, answers: &str) -> Self {
        self.answers = Some(answers.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Renderer for MockRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        self.calls.lock().unwrap().push(format!(
            "render force={} quiet={} vcs_ref={}",
            request.force, request.quiet, request.vcs_ref
        ));
        if let Some(answers) = &self.answers {
            fs::write(request.destination.join(request.answers_file), answers)?;
        }
        Ok(())
    }
}
