//! Git integration: a command runner trait plus typed operations on a
//! repository working directory.
//!
//! Outcomes are classified here, once. Callers receive [`CherryPickResult`]
//! and [`PushResult`] values and never look at git's free-text output
//! themselves. Cherry-pick failures are told apart by the repository state
//! git leaves behind, not by message text.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BackportError, BackportResult};

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    /// stderr followed by stdout, trimmed; git splits diagnostics across both.
    pub fn diagnostic(&self) -> String {
        let mut text = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stdout);
        }
        text
    }
}

/// Blocking-style git command runner: every call completes before the next starts.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    /// Run `git <args>` in `dir` (or the process working directory when `None`).
    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> BackportResult<GitOutput>;
}

/// [`GitExecutor`] backed by the `git` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct ProcessGit {
    program: PathBuf,
    envs: Vec<(String, String)>,
}

impl Default for ProcessGit {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            envs: Vec::new(),
        }
    }
}

impl ProcessGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every git invocation. The locale
    /// variables are always pinned and cannot be overridden here.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }
}

#[async_trait]
impl GitExecutor for ProcessGit {
    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> BackportResult<GitOutput> {
        debug!(dir = ?dir, args = ?args, "git");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd.env("LC_ALL", "C").env("LANGUAGE", "");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| BackportError::Git(format!("failed to run git: {e}")))?;

        Ok(GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}

/// Outcome of `git cherry-pick -x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickResult {
    /// Applied and committed.
    Clean,
    /// The change introduces nothing new on this branch.
    EmptyDiff,
    /// The patch did not apply; the working tree is left conflicted.
    ApplyConflict,
    /// Any other failure, with git's diagnostic.
    OtherFailure(String),
}

/// Repository state observed after `git cherry-pick` returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CherryPickState {
    success: bool,
    /// Paths left unmerged in the index.
    unmerged: bool,
    /// `CHERRY_PICK_HEAD` exists.
    in_progress: bool,
    /// The index differs from `HEAD`.
    staged: bool,
    diagnostic: String,
}

impl CherryPickResult {
    fn classify(state: CherryPickState) -> Self {
        if state.success {
            CherryPickResult::Clean
        } else if state.unmerged {
            CherryPickResult::ApplyConflict
        } else if state.in_progress && !state.staged {
            CherryPickResult::EmptyDiff
        } else {
            CherryPickResult::OtherFailure(state.diagnostic)
        }
    }
}

/// Outcome of `git push origin <branch>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Pushed,
    /// Nothing to push; origin already has the commit.
    UpToDate,
    Rejected(String),
}

impl PushResult {
    fn classify(output: &GitOutput) -> Self {
        if !output.success {
            return PushResult::Rejected(output.diagnostic());
        }
        if output.diagnostic().contains("Everything up-to-date") {
            PushResult::UpToDate
        } else {
            PushResult::Pushed
        }
    }
}

/// Typed git operations on one working directory.
pub struct Repo<'a> {
    git: &'a dyn GitExecutor,
    dir: PathBuf,
}

impl<'a> Repo<'a> {
    pub fn new(git: &'a dyn GitExecutor, dir: impl Into<PathBuf>) -> Self {
        Self {
            git,
            dir: dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    async fn run(&self, args: &[&str]) -> BackportResult<GitOutput> {
        self.git.run(Some(&self.dir), args).await
    }

    async fn run_checked(&self, args: &[&str]) -> BackportResult<GitOutput> {
        let output = self.run(args).await?;
        if !output.success {
            return Err(BackportError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                output.diagnostic()
            )));
        }
        Ok(output)
    }

    /// Clone `url` into this repository's directory.
    pub async fn clone_from(&self, url: &str) -> BackportResult<()> {
        let dir = self.dir.to_string_lossy();
        let output = self.git.run(None, &["clone", url, dir.as_ref()]).await?;
        if !output.success {
            return Err(BackportError::Workspace {
                path: dir.to_string(),
                reason: output.diagnostic(),
            });
        }
        Ok(())
    }

    pub async fn fetch_origin(&self) -> BackportResult<()> {
        self.run_checked(&["fetch", "origin"]).await.map(|_| ())
    }

    pub async fn reset_hard(&self) -> BackportResult<()> {
        self.run_checked(&["reset", "--hard"]).await.map(|_| ())
    }

    /// Delete the local branch. A missing or checked-out branch is not an error.
    pub async fn delete_local_branch(&self, branch: &str) -> BackportResult<()> {
        let output = self.run(&["branch", "-D", branch]).await?;
        if !output.success {
            debug!(branch, diagnostic = %output.diagnostic(), "local branch not deleted");
        }
        Ok(())
    }

    /// Check out `branch` freshly from `origin/<branch>`.
    pub async fn checkout_remote_branch(&self, branch: &str) -> BackportResult<()> {
        let remote = format!("origin/{branch}");
        let output = self
            .run(&["checkout", "-B", branch, "--track", &remote])
            .await?;
        if !output.success {
            return Err(BackportError::Checkout {
                branch: branch.to_string(),
                reason: output.diagnostic(),
            });
        }
        Ok(())
    }

    /// Full message body of `sha`.
    pub async fn commit_message(&self, sha: &str) -> BackportResult<String> {
        let output = self
            .run(&["log", "-1", sha, "--pretty=format:%B"])
            .await?;
        if !output.success {
            return Err(BackportError::Git(format!(
                "unknown commit {sha}: {}",
                output.diagnostic()
            )));
        }
        Ok(output.stdout)
    }

    pub async fn commit_author_email(&self, sha: &str) -> BackportResult<String> {
        let output = self
            .run_checked(&["log", "-1", sha, "--pretty=format:%aE"])
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Run a prepared `git log` query; true when at least one commit matched.
    pub async fn log_matches(&self, args: &[String]) -> BackportResult<bool> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&argv).await?;
        if !output.success {
            return Err(BackportError::Git(format!(
                "history search failed: {}",
                output.diagnostic()
            )));
        }
        Ok(!output.stdout.trim().is_empty())
    }

    pub async fn cherry_pick(&self, sha: &str) -> BackportResult<CherryPickResult> {
        let output = self.run(&["cherry-pick", "-x", sha]).await?;
        if output.success {
            return Ok(CherryPickResult::Clean);
        }

        let unmerged = self
            .run_checked(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        let in_progress = self
            .run(&["rev-parse", "-q", "--verify", "CHERRY_PICK_HEAD"])
            .await?;
        // Exit status 1 means the index differs from HEAD.
        let staged = self.run(&["diff", "--cached", "--quiet"]).await?;

        Ok(CherryPickResult::classify(CherryPickState {
            success: false,
            unmerged: !unmerged.stdout.trim().is_empty(),
            in_progress: in_progress.success,
            staged: !staged.success,
            diagnostic: output.diagnostic(),
        }))
    }

    pub async fn push_branch(&self, branch: &str) -> BackportResult<PushResult> {
        let output = self.run(&["push", "origin", branch]).await?;
        Ok(PushResult::classify(&output))
    }
}
