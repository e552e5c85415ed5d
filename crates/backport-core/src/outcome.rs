//! Per-branch outcomes and the run report built from them.

use serde::{Deserialize, Serialize};

use crate::hosting::PullRequest;

/// How an already-present change was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    /// A commit with the same author and message is reachable from the branch.
    CommitMessage,
    /// Cherry-picking produced an empty diff.
    EmptyDiff,
}

/// Classification of one `(pull request, branch)` pair. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    AlreadyMerged { via: Detection },
    /// Cherry-pick stopped on a conflict; the working tree is left as is.
    Conflict,
    /// Applied and pushed to origin.
    Applied,
    /// Applied locally; dry run, nothing pushed.
    AppliedDryRun,
}

impl MergeOutcome {
    pub fn glyph(self) -> Glyph {
        match self {
            MergeOutcome::AlreadyMerged { .. } | MergeOutcome::Applied => Glyph::Success,
            MergeOutcome::AppliedDryRun => Glyph::Caution,
            MergeOutcome::Conflict => Glyph::Failure,
        }
    }

    /// Whether linked issues should be told the change is on this branch.
    pub fn is_notifiable(self) -> bool {
        matches!(
            self,
            MergeOutcome::AlreadyMerged { .. } | MergeOutcome::Applied
        )
    }
}

/// Three-state status marker shown next to every branch line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Glyph {
    Success,
    Caution,
    Failure,
}

/// What happened on one target branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchStatus {
    Done { outcome: MergeOutcome },
    /// The branch could not be processed; `fatal` marks errors that stopped the run.
    Failed { reason: String, fatal: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchReport {
    pub branch: String,
    pub status: BranchStatus,
}

impl BranchReport {
    pub fn done(branch: &str, outcome: MergeOutcome) -> Self {
        Self {
            branch: branch.to_string(),
            status: BranchStatus::Done { outcome },
        }
    }

    pub fn failed(branch: &str, reason: impl Into<String>, fatal: bool) -> Self {
        Self {
            branch: branch.to_string(),
            status: BranchStatus::Failed {
                reason: reason.into(),
                fatal,
            },
        }
    }

    pub fn outcome(&self) -> Option<MergeOutcome> {
        match &self.status {
            BranchStatus::Done { outcome } => Some(*outcome),
            BranchStatus::Failed { .. } => None,
        }
    }

    pub fn glyph(&self) -> Glyph {
        match &self.status {
            BranchStatus::Done { outcome } => outcome.glyph(),
            BranchStatus::Failed { .. } => Glyph::Failure,
        }
    }

    /// Success lines are hidden by `--only-missing`.
    pub fn needs_attention(&self) -> bool {
        !matches!(
            self.status,
            BranchStatus::Done {
                outcome: MergeOutcome::AlreadyMerged { .. } | MergeOutcome::Applied
            }
        )
    }
}

/// Counters from the linked-issue notification step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub posted: usize,
    pub skipped_duplicate: usize,
    pub inaccessible: usize,
    pub failed: usize,
}

/// Everything one pull request backport produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    pub pull_request: PullRequest,
    /// Local mirror used as the workspace.
    pub workspace: String,
    pub dry_run: bool,
    pub branches: Vec<BranchReport>,
    /// Set when no target applied to this repository.
    pub no_targets: bool,
    /// Error that stopped the branch loop early.
    pub fatal: Option<String>,
    /// Branch whose cherry-pick conflict is still in the working tree.
    pub paused_on: Option<String>,
    /// `None` when notification did not run (dry run or fatal error).
    pub notifications: Option<NotificationSummary>,
}

impl ReleaseReport {
    /// False when the process should exit with a failure status.
    pub fn exit_ok(&self) -> bool {
        self.fatal.is_none()
            && !self.no_targets
            && !self
                .branches
                .iter()
                .any(|b| matches!(b.status, BranchStatus::Failed { .. }))
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &BranchReport> {
        self.branches
            .iter()
            .filter(|b| b.outcome() == Some(MergeOutcome::Conflict))
    }
}
