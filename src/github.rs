//! # Hosting Platform API
//!
//! The update workflow needs a handful of calls against the hosting
//! platform: repository and branch lookups, a file-existence probe, and pull
//! request creation, lookup and closing. They are collected in the
//! [`HostingPlatform`] trait so that handles and the orchestrator can be
//! exercised against an in-memory fake in tests.
//!
//! [`GitHubClient`] implements the trait against the GitHub REST API with a
//! blocking `ureq` agent. Every request carries the token as a bearer
//! credential; the token itself is never logged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const GITHUB_API: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// An `org/name` pair identifying a repository on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub org: String,
    pub name: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.org, self.name)
    }
}

/// Repository metadata as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRepo {
    pub name: String,
    pub clone_url: String,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
}

/// A branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

#[derive(Deserialize)]
struct BranchWire {
    name: String,
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

impl From<BranchWire> for Branch {
    fn from(wire: BranchWire) -> Self {
        Self {
            name: wire.name,
            sha: wire.commit.sha,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
}

/// Parameters for opening a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

/// Outcome of probing for a file. Any other failure is an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentProbe {
    Found,
    NotFound,
}

/// Operations consumed from the hosting platform.
pub trait HostingPlatform: Send + Sync {
    fn get_repo(&self, repo: &RepoId) -> Result<RemoteRepo>;

    /// Every repository owned by `org`.
    fn list_org_repos(&self, org: &str) -> Result<Vec<RemoteRepo>>;

    fn list_branches(&self, repo: &RepoId) -> Result<Vec<Branch>>;

    fn get_branch(&self, repo: &RepoId, branch: &str) -> Result<Branch>;

    /// Check whether `path` exists on the default branch.
    fn probe_content(&self, repo: &RepoId, path: &str) -> Result<ContentProbe>;

    fn create_pull(&self, repo: &RepoId, pull: &NewPullRequest) -> Result<PullRequest>;

    /// Pull requests whose head includes commit `sha`.
    fn pulls_for_commit(&self, repo: &RepoId, sha: &str) -> Result<Vec<PullRequest>>;

    fn close_pull(&self, repo: &RepoId, number: u64) -> Result<()>;
}

/// GitHub REST API client.
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(token, GITHUB_API)
    }

    /// Point the client at another API root (GitHub Enterprise, tests).
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(concat!("filesync/", env!("CARGO_PKG_VERSION")))
                .build(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn send(&self, method: &str, path: &str, body: Option<serde_json::Value>) -> Result<ureq::Response> {
        let url = format!("{}{}", self.api_base, path);
        log::trace!("{} {}", method, url);
        let request = self
            .agent
            .request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28");
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => Err(Error::Api {
                method: method.to_string(),
                url,
                status,
                message: api_message(response),
            }),
            Err(ureq::Error::Transport(transport)) => Err(Error::Network {
                url,
                message: transport.to_string(),
            }),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send("GET", path, None)?;
        Ok(response.into_json()?)
    }

    /// Follow page numbers until a short page comes back.
    fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        for page in 1.. {
            let batch: Vec<T> =
                self.get_json(&format!("{}{}per_page={}&page={}", path, sep, PER_PAGE, page))?;
            let done = batch.len() < PER_PAGE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }
}

fn api_message(response: ureq::Response) -> String {
    #[derive(Deserialize)]
    struct ApiError {
        message: String,
    }
    let text = response.into_string().unwrap_or_default();
    serde_json::from_str::<ApiError>(&text)
        .map(|e| e.message)
        .unwrap_or(text)
}

impl HostingPlatform for GitHubClient {
    fn get_repo(&self, repo: &RepoId) -> Result<RemoteRepo> {
        self.get_json(&format!("/repos/{}/{}", repo.org, repo.name))
    }

    fn list_org_repos(&self, org: &str) -> Result<Vec<RemoteRepo>> {
        self.get_all(&format!("/orgs/{}/repos", org))
    }

    fn list_branches(&self, repo: &RepoId) -> Result<Vec<Branch>> {
        let wire: Vec<BranchWire> =
            self.get_all(&format!("/repos/{}/{}/branches", repo.org, repo.name))?;
        Ok(wire.into_iter().map(Branch::from).collect())
    }

    fn get_branch(&self, repo: &RepoId, branch: &str) -> Result<Branch> {
        let wire: BranchWire =
            self.get_json(&format!("/repos/{}/{}/branches/{}", repo.org, repo.name, branch))?;
        Ok(wire.into())
    }

    fn probe_content(&self, repo: &RepoId, path: &str) -> Result<ContentProbe> {
        match self.send(
            "GET",
            &format!("/repos/{}/{}/contents/{}", repo.org, repo.name, path),
            None,
        ) {
            Ok(_) => Ok(ContentProbe::Found),
            Err(e) if e.is_not_found() => Ok(ContentProbe::NotFound),
            Err(e) => Err(e),
        }
    }

    fn create_pull(&self, repo: &RepoId, pull: &NewPullRequest) -> Result<PullRequest> {
        let response = self.send(
            "POST",
            &format!("/repos/{}/{}/pulls", repo.org, repo.name),
            Some(serde_json::to_value(pull)?),
        )?;
        Ok(response.into_json()?)
    }

    fn pulls_for_commit(&self, repo: &RepoId, sha: &str) -> Result<Vec<PullRequest>> {
        self.get_all(&format!("/repos/{}/{}/commits/{}/pulls", repo.org, repo.name, sha))
    }

    fn close_pull(&self, repo: &RepoId, number: u64) -> Result<()> {
        self.send(
            "PATCH",
            &format!("/repos/{}/{}/pulls/{}", repo.org, repo.name, number),
            Some(serde_json::json!({ "state": "closed" })),
        )?;
        Ok(())
    }
}
