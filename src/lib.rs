//! # Filesync Library
//!
//! This library keeps many repositories in sync with a shared template
//! repository. It is designed to be used by the `filesync` command-line
//! tool, but the driver and its collaborators can be embedded elsewhere.
//!
//! ## Quick Example
//!
//! ```
//! use filesync::config::{resolve_repo, RunConfig, TemplateConfig};
//!
//! let template = TemplateConfig::parse(
//!     r#"
//! org: acme
//! branch-prefix: chore
//! repos:
//!   - widgets
//!   - gadgets:
//!       base-branch: develop
//! "#,
//! )
//! .unwrap();
//! let run = RunConfig::new("acme/acme-template");
//!
//! let settings = resolve_repo(&template, &run, "gadgets").unwrap();
//! assert_eq!(settings.org, "acme");
//! assert_eq!(settings.branch_prefix, "chore");
//! assert_eq!(settings.base_branch.as_deref(), Some("develop"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the template's `filesync.yaml`, per-repo
//!   overrides and the global run options, flattened per target repository.
//! - **Handles (`repository`, `template`, `target`)**: a clone of a remote
//!   repository plus the lazily fetched branch state needed to pick a base
//!   branch and name the update branch.
//! - **Collaborators (`git`, `github`, `render`, `hooks`)**: the `git` CLI,
//!   the hosting API, the `copier` renderer and user hook scripts, each
//!   behind a small trait or function seam.
//! - **Orchestration (`orchestrator`, `driver`)**: the per-repository
//!   lifecycle and the run loop around it.
//!
//! ## Execution Flow
//!
//! For each target repository, [`orchestrator::Orchestrator::run`] executes:
//!
//! 1.  **Clone**: shallow-clone the target and check out its base branch.
//! 2.  **Branch**: create the update branch named after the template head.
//! 3.  **Gate**: skip the repository if it already has this update.
//! 4.  **Render**: run the template over the clone.
//! 5.  **Confirm**: skip if only the answers file changed.
//! 6.  **Clean**: close and delete update branches for older template heads.
//! 7.  **Push**: commit and push the update branch.
//! 8.  **Pull request**: open one, or find the existing one when fixing.
//!
//! Hook scripts from the template can run before and after clone, render
//! and push.

pub mod config;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod git;
pub mod github;
pub mod hooks;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod render;
pub mod repository;
pub mod shard;
pub mod target;
pub mod template;

#[cfg(test)]
mod test_support;
