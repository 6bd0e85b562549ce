//! # Lifecycle Hooks
//!
//! A template may configure an executable for any of six points in a target
//! repository's update lifecycle. Each hook is called as
//!
//! ```text
//! <template-clone>/<script> <operation> <clone-root> <repo-name> <answers-file>
//! ```
//!
//! and a non-zero exit aborts that repository with [`Error::HookFailure`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// A point in the lifecycle at which a hook may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSlot {
    PreClone,
    PostClone,
    PreRender,
    PostRender,
    PrePush,
    PostPush,
}

impl HookSlot {
    pub const ALL: [HookSlot; 6] = [
        HookSlot::PreClone,
        HookSlot::PostClone,
        HookSlot::PreRender,
        HookSlot::PostRender,
        HookSlot::PrePush,
        HookSlot::PostPush,
    ];

    /// Name used as the key in the `hooks:` config mapping.
    pub fn as_str(self) -> &'static str {
        match self {
            HookSlot::PreClone => "pre-clone",
            HookSlot::PostClone => "post-clone",
            HookSlot::PreRender => "pre-copier",
            HookSlot::PostRender => "post-copier",
            HookSlot::PrePush => "pre-push",
            HookSlot::PostPush => "post-push",
        }
    }

    /// Config keys accepted for this slot. Underscores are accepted in place
    /// of hyphens, and the render hooks also answer to `*-render`.
    fn matches(self, key: &str) -> bool {
        let key = key.replace('_', "-");
        key == self.as_str()
            || match self {
                HookSlot::PreRender => key == "pre-render",
                HookSlot::PostRender => key == "post-render",
                _ => false,
            }
    }

    /// Look up the script configured for this slot.
    pub fn script(self, hooks: &BTreeMap<String, String>) -> Option<&str> {
        hooks
            .iter()
            .find(|(key, _)| self.matches(key))
            .map(|(_, script)| script.as_str())
    }
}

impl fmt::Display for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys in a `hooks:` mapping that do not name any slot.
pub fn unknown_hooks(hooks: &BTreeMap<String, String>) -> Vec<String> {
    hooks
        .keys()
        .filter(|key| !HookSlot::ALL.iter().any(|slot| slot.matches(key)))
        .cloned()
        .collect()
}

/// Arguments passed to every hook.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    /// Directory hook script paths are relative to.
    pub template_dir: &'a Path,
    pub operation: &'a str,
    pub clone_root: &'a Path,
    pub repo_name: &'a str,
    pub answers_file: &'a str,
    pub log_target: &'a str,
}

/// Run the hook configured for `slot`, if any.
///
/// Returns `Ok(false)` when no hook is configured.
pub fn run_hook(
    slot: HookSlot,
    hooks: &BTreeMap<String, String>,
    ctx: &HookContext<'_>,
) -> Result<bool> {
    let Some(script) = slot.script(hooks) else {
        return Ok(false);
    };
    let program: PathBuf = ctx.template_dir.join(script);
    let clone_root = ctx.clone_root.display().to_string();
    let args = [ctx.operation, clone_root.as_str(), ctx.repo_name, ctx.answers_file];
    log::info!(
        target: ctx.log_target,
        "running {} hook: {} {}",
        slot,
        script,
        args.join(" ")
    );

    let output = Command::new(&program)
        .args(args)
        .output()
        .map_err(|e| Error::HookFailure {
            hook: slot.to_string(),
            script: script.to_string(),
            code: None,
            stderr: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        log::debug!(target: ctx.log_target, "{} hook output:\n{}", slot, stdout.trim_end());
    }
    if !output.status.success() {
        return Err(Error::HookFailure {
            hook: slot.to_string(),
            script: script.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(true)
}
