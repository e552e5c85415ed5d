//! Applies a change that the classifier did not find, then pushes it.

use tracing::{info, warn};

use crate::error::{BackportError, BackportResult};
use crate::git::{CherryPickResult, PushResult, Repo};
use crate::outcome::{Detection, MergeOutcome};

/// Cherry-pick `sha` onto the checked out `branch` and push unless `dry_run`.
///
/// A conflict leaves the working tree conflicted for manual resolution.
/// Unrecognised cherry-pick failures and push rejections are errors.
pub async fn apply(
    repo: &Repo<'_>,
    branch: &str,
    sha: &str,
    dry_run: bool,
) -> BackportResult<MergeOutcome> {
    match repo.cherry_pick(sha).await? {
        CherryPickResult::EmptyDiff => {
            info!(branch, sha, "cherry-pick is empty, change already present");
            return Ok(MergeOutcome::AlreadyMerged {
                via: Detection::EmptyDiff,
            });
        }
        CherryPickResult::ApplyConflict => {
            warn!(branch, sha, "cherry-pick conflict, manual resolution required");
            return Ok(MergeOutcome::Conflict);
        }
        CherryPickResult::OtherFailure(diagnostic) => {
            return Err(BackportError::CherryPick {
                sha: sha.to_string(),
                branch: branch.to_string(),
                diagnostic,
            });
        }
        CherryPickResult::Clean => {}
    }

    if dry_run {
        info!(branch, sha, "applied locally, not pushing because of dry run");
        return Ok(MergeOutcome::AppliedDryRun);
    }

    match repo.push_branch(branch).await? {
        PushResult::Pushed | PushResult::UpToDate => {
            info!(branch, sha, "pushed backport to origin");
            Ok(MergeOutcome::Applied)
        }
        PushResult::Rejected(reason) => Err(BackportError::Push {
            branch: branch.to_string(),
            reason,
        }),
    }
}
