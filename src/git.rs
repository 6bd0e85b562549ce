//! Thin wrappers around the system `git` command.
//!
//! Every function runs one (or a short fixed sequence of) `git`
//! invocation(s). A non-zero exit status becomes [`Error::GitCommand`] with
//! stderr attached. Clone URLs carry a token, so command lines and stderr are
//! passed through [`redact`] before they end up in an error or a log line.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};

/// Replace the userinfo part of any URL in `text` with `***`.
pub fn redact(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("://") {
        let (head, tail) = rest.split_at(idx + 3);
        out.push_str(head);
        let end = tail
            .find(|c: char| c == '/' || c.is_whitespace())
            .unwrap_or(tail.len());
        match tail[..end].rfind('@') {
            Some(at) => {
                out.push_str("***");
                out.push_str(&tail[at..end]);
            }
            None => out.push_str(&tail[..end]),
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

fn spawn(dir: Option<&Path>, args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.output().map_err(|e| Error::GitCommand {
        command: redact(&args.join(" ")),
        dir: dir.map(|d| d.display().to_string()).unwrap_or_default(),
        stderr: e.to_string(),
    })
}

fn failure(dir: Option<&Path>, args: &[&str], output: &Output) -> Error {
    Error::GitCommand {
        command: redact(&args.join(" ")),
        dir: dir.map(|d| d.display().to_string()).unwrap_or_default(),
        stderr: redact(String::from_utf8_lossy(&output.stderr).trim()),
    }
}

/// Run `git <args>` inside `dir` and return stdout.
pub fn run(dir: &Path, args: &[&str]) -> Result<String> {
    let output = spawn(Some(dir), args)?;
    if !output.status.success() {
        return Err(failure(Some(dir), args, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Shallow-clone `url` (depth 1) into `target_dir`.
pub fn clone_shallow(url: &str, target_dir: &Path) -> Result<()> {
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }
    let target = target_dir.to_string_lossy();
    let args = ["clone", "--depth", "1", url, target.as_ref()];
    let output = spawn(None, &args)?;
    if !output.status.success() {
        return Err(failure(None, &args, &output));
    }
    Ok(())
}

/// Name of the checked-out branch.
pub fn current_branch(dir: &Path) -> Result<String> {
    Ok(run(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?.trim().to_string())
}

/// Whether tracked files differ from HEAD (staged or not).
pub fn is_dirty(dir: &Path) -> Result<bool> {
    let args = ["diff", "--quiet", "HEAD"];
    let output = spawn(Some(dir), &args)?;
    match output.status.code() {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(failure(Some(dir), &args, &output)),
    }
}

/// Narrow `origin` to `branch`, fetch it at depth 1 and check it out.
pub fn fetch_and_checkout(dir: &Path, branch: &str) -> Result<()> {
    fetch_branch(dir, branch)?;
    run(dir, &["checkout", branch])?;
    Ok(())
}

fn fetch_branch(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["remote", "set-branches", "origin", branch])?;
    run(dir, &["fetch", "--depth", "1", "origin", branch])?;
    Ok(())
}

/// `git checkout -b <branch>`
pub fn create_branch(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["checkout", "-b", branch])?;
    Ok(())
}

/// Paths with any change in the working tree, untracked files included.
pub fn changed_paths(dir: &Path) -> Result<Vec<String>> {
    let status = run(dir, &["status", "--porcelain", "--untracked-files=all"])?;
    Ok(parse_porcelain(&status))
}

/// Extract paths from `git status --porcelain` (v1) output.
pub fn parse_porcelain(status: &str) -> Vec<String> {
    status
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            // renames are reported as "old -> new"
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            path.trim_matches('"').to_string()
        })
        .collect()
}

/// Push `branch` to origin and make the local branch track it.
pub fn publish_branch(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["push", "origin", branch])?;
    fetch_branch(dir, branch)?;
    let upstream = format!("origin/{}", branch);
    run(dir, &["branch", "--set-upstream-to", &upstream])?;
    Ok(())
}

/// Stage everything and commit it with `message`.
pub fn commit_all(dir: &Path, message: &str) -> Result<()> {
    run(dir, &["add", "-A"])?;
    run(dir, &["commit", "-m", message])?;
    Ok(())
}

/// `git push` to the tracked upstream.
pub fn push(dir: &Path) -> Result<()> {
    run(dir, &["push"])?;
    Ok(())
}

pub fn delete_remote_branch(dir: &Path, branch: &str) -> Result<()> {
    run(dir, &["push", "origin", "--delete", branch])?;
    Ok(())
}

/// Read a global git config value; `None` when it is not set.
pub fn config_get(key: &str) -> Result<Option<String>> {
    let args = ["config", "--get", key];
    let output = spawn(None, &args)?;
    match output.status.code() {
        Some(0) => Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        )),
        Some(1) => Ok(None),
        _ => Err(failure(None, &args, &output)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    /// Create a repository with one commit on `main`, without relying on
    /// the caller's git identity.
    fn init_origin(dir: &Path) {
        let steps: &[&[&str]] = &[
            &["init", "-q", "-b", "main"],
            &["add", "-A"],
            &[
                "-c",
                "user.name=test",
                "-c",
                "user.email=test@example.com",
                "commit",
                "-q",
                "-m",
                "init",
            ],
        ];
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        for step in steps {
            let status = Command::new("git")
                .args(*step)
                .current_dir(dir)
                .status()
                .unwrap();
            assert!(status.success(), "git {:?} failed", step);
        }
    }

    #[test]
    fn test_redact_token_in_url() {
        assert_eq!(
            redact("clone --depth 1 https://s3cr3t@github.com/acme/widgets.git /tmp/x"),
            "clone --depth 1 https://***@github.com/acme/widgets.git /tmp/x"
        );
    }

    #[test]
    fn test_redact_without_userinfo() {
        let text = "fatal: https://github.com/acme/widgets.git not found";
        assert_eq!(redact(text), text);
    }

    #[test]
    fn test_redact_multiple_urls() {
        assert_eq!(
            redact("a https://x:y@h/p and ssh://t@h2/q"),
            "a https://***@h/p and ssh://***@h2/q"
        );
    }

    #[test]
    fn test_parse_porcelain() {
        let status = " M src/app.py\n?? .copier-answers.yml\nR  old.txt -> new.txt\n?? \"with space.txt\"\n";
        assert_eq!(
            parse_porcelain(status),
            vec!["src/app.py", ".copier-answers.yml", "new.txt", "with space.txt"]
        );
    }

    #[test]
    fn test_parse_porcelain_empty() {
        assert!(parse_porcelain("").is_empty());
    }

    #[test]
    fn test_clone_and_inspect_local_repository() {
        if !git_available() {
            return;
        }
        let origin = TempDir::new().unwrap();
        init_origin(origin.path());

        let root = TempDir::new().unwrap();
        let clone = root.path().join("nested").join("widgets");
        let url = format!("file://{}", origin.path().display());
        clone_shallow(&url, &clone).unwrap();

        assert_eq!(current_branch(&clone).unwrap(), "main");
        assert!(!is_dirty(&clone).unwrap());
        assert!(changed_paths(&clone).unwrap().is_empty());

        fs::write(clone.join("README.md"), "changed\n").unwrap();
        fs::write(clone.join("new.txt"), "new\n").unwrap();
        assert!(is_dirty(&clone).unwrap());
        let mut changed = changed_paths(&clone).unwrap();
        changed.sort();
        assert_eq!(changed, vec!["README.md", "new.txt"]);

        create_branch(&clone, "filesync/t/abc").unwrap();
        assert_eq!(current_branch(&clone).unwrap(), "filesync/t/abc");
    }

    #[test]
    fn test_run_failure_reports_stderr() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let err = run(dir.path(), &["rev-parse", "HEAD"]).unwrap_err();
        assert!(matches!(err, Error::GitCommand { .. }));
        assert!(err.to_string().contains("rev-parse HEAD"));
    }
}
