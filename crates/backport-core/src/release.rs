//! Backport of one pull request onto its target branches.
//!
//! [`Releaser::release`] drives the per-branch state machine: checkout,
//! classify, and cherry-pick/push when needed. It then notifies linked
//! issues. Branches are processed strictly in order because they share one
//! working copy.

use tracing::{info, warn, Instrument};

use crate::cache::RepositoryCache;
use crate::classifier::{self, MergeState};
use crate::error::{BackportError, BackportResult};
use crate::executor;
use crate::git::{GitExecutor, Repo};
use crate::hosting::CodeHost;
use crate::notifier;
use crate::outcome::{BranchReport, Detection, MergeOutcome, ReleaseReport};
use crate::references::Reference;
use crate::resolver::resolve_targets;
use crate::telemetry::release_span;

/// Behaviour switches for a release run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Apply locally but never push or comment.
    pub dry_run: bool,
    /// Base URL repositories are cloned from, `<base>/<org>/<repo>`.
    pub clone_base_url: String,
}

impl ReleaseOptions {
    pub fn new(clone_base_url: &str, dry_run: bool) -> Self {
        Self {
            dry_run,
            clone_base_url: clone_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn clone_url(&self, org: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.clone_base_url, org, repo)
    }
}

/// Backports pull requests using explicitly passed collaborators.
pub struct Releaser<'a> {
    git: &'a dyn GitExecutor,
    host: &'a dyn CodeHost,
    cache: &'a RepositoryCache,
    options: ReleaseOptions,
}

impl<'a> Releaser<'a> {
    pub fn new(
        git: &'a dyn GitExecutor,
        host: &'a dyn CodeHost,
        cache: &'a RepositoryCache,
        options: ReleaseOptions,
    ) -> Self {
        Self {
            git,
            host,
            cache,
            options,
        }
    }

    /// Backport `pr_ref` onto every branch in `targets` that applies to its repository.
    ///
    /// Errors returned here happen before any branch is touched (lock, clone,
    /// pull request state). Errors during the branch loop are recorded in the
    /// report instead.
    pub async fn release<S: AsRef<str>>(
        &self,
        pr_ref: &Reference,
        targets: &[S],
    ) -> BackportResult<ReleaseReport> {
        let targets: Vec<String> = targets.iter().map(|t| t.as_ref().to_string()).collect();
        self.release_inner(pr_ref, &targets)
            .instrument(release_span(pr_ref))
            .await
    }

    async fn release_inner(
        &self,
        pr_ref: &Reference,
        targets: &[String],
    ) -> BackportResult<ReleaseReport> {
        let _lock = self.cache.lock(&pr_ref.org, &pr_ref.repo)?;

        let path = self.cache.path_for(&pr_ref.org, &pr_ref.repo);
        let url = self.options.clone_url(&pr_ref.org, &pr_ref.repo);
        self.cache.ensure(self.git, &url, &path).await?;

        let pr = self.host.pull_request(pr_ref).await?;
        if !pr.is_closed() {
            return Err(BackportError::State {
                url: pr.html_url.clone(),
                state: pr.state.clone(),
            });
        }
        let sha = pr
            .merge_commit_sha
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| BackportError::State {
                url: pr.html_url.clone(),
                state: format!("{} without merge commit", pr.state),
            })?;

        let mut report = ReleaseReport {
            pull_request: pr.clone(),
            workspace: path.display().to_string(),
            dry_run: self.options.dry_run,
            branches: Vec::new(),
            no_targets: false,
            fatal: None,
            paused_on: None,
            notifications: None,
        };

        let branches = resolve_targets(targets, &pr.repo);
        if branches.is_empty() {
            warn!(repo = %pr.repo, "no merge destination applies to this repository");
            report.no_targets = true;
            return Ok(report);
        }

        let repo = Repo::new(self.git, &path);
        for branch in &branches {
            match self.process_branch(&repo, branch, &sha).await {
                Ok(outcome) => {
                    info!(branch = %branch, outcome = ?outcome, "branch processed");
                    report.branches.push(BranchReport::done(branch, outcome));
                }
                Err(e) if !e.is_fatal_for_pull_request() => {
                    warn!(branch = %branch, error = %e, "branch skipped");
                    report
                        .branches
                        .push(BranchReport::failed(branch, e.to_string(), false));
                }
                Err(e) => {
                    warn!(branch = %branch, error = %e, "stopping backport of this pull request");
                    report
                        .branches
                        .push(BranchReport::failed(branch, e.to_string(), true));
                    report.fatal = Some(e.to_string());
                    break;
                }
            }
        }

        report.paused_on = report
            .branches
            .last()
            .filter(|b| b.outcome() == Some(MergeOutcome::Conflict))
            .map(|b| b.branch.clone());

        if report.fatal.is_none() && !self.options.dry_run {
            let notify: Vec<String> = report
                .branches
                .iter()
                .filter(|b| b.outcome().is_some_and(MergeOutcome::is_notifiable))
                .map(|b| b.branch.clone())
                .collect();
            report.notifications =
                Some(notifier::notify_linked_issues(self.host, &pr, &notify).await);
        }

        Ok(report)
    }

    /// `Checkout → Classify → (CherryPick → Push)` for one branch.
    async fn process_branch(
        &self,
        repo: &Repo<'_>,
        branch: &str,
        sha: &str,
    ) -> BackportResult<MergeOutcome> {
        if let Err(e) = repo.reset_hard().await {
            warn!(branch, error = %e, "reset --hard failed before checkout");
        }
        repo.delete_local_branch(branch).await?;
        repo.checkout_remote_branch(branch).await?;

        let state = classifier::classify(repo, branch, sha)
            .await
            .map_err(|e| BackportError::Classification {
                branch: branch.to_string(),
                reason: e.to_string(),
            })?;
        if state == MergeState::AlreadyMerged {
            return Ok(MergeOutcome::AlreadyMerged {
                via: Detection::CommitMessage,
            });
        }

        executor::apply(repo, branch, sha, self.options.dry_run).await
    }
}
