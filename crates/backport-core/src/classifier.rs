//! Decides whether a merge commit is already present on a branch.
//!
//! A cherry-picked commit has a new id, so presence is detected by content:
//! the same author plus every non-blank line of the merge commit's message,
//! all required to appear in one single reachable commit.

use tracing::debug;

use crate::error::BackportResult;
use crate::git::Repo;

/// Search predicate identifying a change independently of its commit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFingerprint {
    pub author_email: String,
    pub message_lines: Vec<String>,
}

impl CommitFingerprint {
    pub fn from_commit_message(author_email: &str, message: &str) -> Self {
        let message_lines = message
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            author_email: author_email.trim().to_string(),
            message_lines,
        }
    }

    /// Read the fingerprint of `sha` from the repository.
    pub async fn load(repo: &Repo<'_>, sha: &str) -> BackportResult<Self> {
        let message = repo.commit_message(sha).await?;
        let email = repo.commit_author_email(sha).await?;
        Ok(Self::from_commit_message(&email, &message))
    }

    /// Arguments for a `git log` search of `branch`, or `None` when the
    /// fingerprint has nothing to match on.
    ///
    /// Without any message line the search would match every commit by the
    /// author, so an empty fingerprint never produces a query.
    pub fn log_query(&self, branch: &str) -> Option<Vec<String>> {
        if self.message_lines.is_empty() || self.author_email.is_empty() {
            return None;
        }

        let mut args = vec![
            "log".to_string(),
            branch.to_string(),
            "--format=%H".to_string(),
            "--all-match".to_string(),
            "--fixed-strings".to_string(),
            format!("--author={}", self.author_email),
        ];
        args.extend(self.message_lines.iter().map(|line| format!("--grep={line}")));
        args.push("--".to_string());
        Some(args)
    }
}

/// Result of searching a branch's history for a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    AlreadyMerged,
    NotFound,
}

/// Classify `sha` against the currently checked out `branch`.
pub async fn classify(repo: &Repo<'_>, branch: &str, sha: &str) -> BackportResult<MergeState> {
    let fingerprint = CommitFingerprint::load(repo, sha).await?;

    let Some(query) = fingerprint.log_query(branch) else {
        debug!(branch, sha, "merge commit has an empty message body, skipping history search");
        return Ok(MergeState::NotFound);
    };

    if repo.log_matches(&query).await? {
        Ok(MergeState::AlreadyMerged)
    } else {
        Ok(MergeState::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_drops_blank_lines_and_trims() {
        let fp = CommitFingerprint::from_commit_message(
            " dev@acme.io\n",
            "Fix bug A\n\n   \n  Fix bug B  \n",
        );
        assert_eq!(fp.author_email, "dev@acme.io");
        assert_eq!(fp.message_lines, vec!["Fix bug A", "Fix bug B"]);
    }

    #[test]
    fn query_is_conjunctive_over_every_line() {
        let fp = CommitFingerprint::from_commit_message("dev@acme.io", "Fix bug A\nFix bug B");
        let q = fp.log_query("release-1.0").unwrap();
        assert_eq!(q[0], "log");
        assert_eq!(q[1], "release-1.0");
        assert!(q.contains(&"--all-match".to_string()));
        assert!(q.contains(&"--author=dev@acme.io".to_string()));
        assert!(q.contains(&"--grep=Fix bug A".to_string()));
        assert!(q.contains(&"--grep=Fix bug B".to_string()));
        assert_eq!(q.last().map(String::as_str), Some("--"));
    }

    #[test]
    fn empty_body_yields_no_query() {
        let fp = CommitFingerprint::from_commit_message("dev@acme.io", "\n   \n");
        assert!(fp.message_lines.is_empty());
        assert!(fp.log_query("main").is_none());
    }

    #[test]
    fn missing_author_yields_no_query() {
        let fp = CommitFingerprint::from_commit_message("", "Fix bug A");
        assert!(fp.log_query("main").is_none());
    }
}
