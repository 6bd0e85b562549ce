//! # Template Rendering
//!
//! Rendering is delegated to the external `copier` tool. The [`Renderer`]
//! trait is the seam: [`CopierRenderer`] shells out to `copier copy`, and
//! tests substitute a fake that writes a canned answers file.
//!
//! After a render, copier's answers file records the applied commit as
//! `_commit` and the local source directory as `_src_path`. [`munge_answers`]
//! renames the former to `_template_version`, which copier does not read,
//! and drops the latter so no local path is committed.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Key copier writes with the applied template commit.
pub const COPIER_COMMIT_KEY: &str = "_commit";
/// Key copier writes with the template source directory.
pub const COPIER_SRC_PATH_KEY: &str = "_src_path";
/// Key under which the applied template commit is kept.
pub const TEMPLATE_VERSION_KEY: &str = "_template_version";

/// One render of the template clone into a target clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    /// Answers file name, relative to `destination`.
    pub answers_file: &'a str,
    /// Overwrite existing files without asking.
    pub force: bool,
    /// Suppress renderer output.
    pub quiet: bool,
    /// Template revision to render.
    pub vcs_ref: &'a str,
    /// Let the renderer prompt on the terminal.
    pub interactive: bool,
}

/// Trait for template renderers - allows mocking in tests
pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<()>;
}

/// Runs the `copier` executable found on `PATH`.
pub struct CopierRenderer {
    program: String,
}

impl CopierRenderer {
    pub fn new() -> Self {
        Self::with_program("copier")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(request: &RenderRequest<'_>) -> Vec<String> {
        let mut args = vec![
            "copy".to_string(),
            "--answers-file".to_string(),
            request.answers_file.to_string(),
            "--vcs-ref".to_string(),
            request.vcs_ref.to_string(),
        ];
        if request.force {
            args.push("--force".to_string());
        }
        if request.quiet {
            args.push("--quiet".to_string());
        }
        args.push(request.source.display().to_string());
        args.push(request.destination.display().to_string());
        args
    }
}

impl Default for CopierRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for CopierRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<()> {
        let args = Self::args(request);
        let failure = |message: String| Error::Render {
            destination: request.destination.display().to_string(),
            message,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        if request.interactive {
            let status = cmd
                .status()
                .map_err(|e| failure(format!("failed to run {}: {}", self.program, e)))?;
            if !status.success() {
                return Err(failure(format!("{} exited with {}", self.program, status)));
            }
            return Ok(());
        }

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| failure(format!("failed to run {}: {}", self.program, e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !request.quiet {
            // copier reports the files it writes on stderr
            for stream in [&stdout, &stderr] {
                if !stream.trim().is_empty() {
                    log::info!("{}", stream.trim_end());
                }
            }
        }
        if !output.status.success() {
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn load_answers(path: &Path) -> Result<Mapping> {
    let content = fs::read_to_string(path)?;
    match serde_yaml::from_str::<Value>(&content)? {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => Err(Error::AnswersFile {
            path: path.display().to_string(),
        }),
    }
}

/// Rename `_commit` to `_template_version` and drop `_src_path` in the
/// answers file at `path`, rewriting it in place.
pub fn munge_answers(path: &Path) -> Result<()> {
    let mut answers = load_answers(path)?;
    if let Some(commit) = answers.remove(COPIER_COMMIT_KEY) {
        answers.insert(Value::from(TEMPLATE_VERSION_KEY), commit);
    }
    answers.remove(COPIER_SRC_PATH_KEY);
    fs::write(path, serde_yaml::to_string(&answers)?)?;
    Ok(())
}

/// The `_template_version` recorded in the answers file at `path`.
///
/// `None` when the file does not exist or has no version, which callers
/// treat as "update required".
pub fn read_template_version(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let answers = load_answers(path)?;
    Ok(match answers.get(TEMPLATE_VERSION_KEY) {
        Some(Value::String(version)) => Some(version.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
