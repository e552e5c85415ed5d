//! Posts a status comment on every issue a pull request references.
//!
//! The composed comment text is the idempotence key: an issue that already
//! carries a comment containing it is left alone, so repeated runs never
//! duplicate notifications.

use tracing::{debug, info, warn};

use crate::hosting::{CodeHost, PullRequest};
use crate::outcome::NotificationSummary;
use crate::references::{url_host, Reference};

/// Comment text announcing that `pr_url` landed on `branch`.
pub fn comment_body(pr_url: &str, branch: &str) -> String {
    format!(
        "{pr_url} was merged to `{branch}` branch\n<details><summary></summary>Created via API</details>"
    )
}

/// Issues linked from the pull request's description that live on the same
/// host and in the same organisation as the pull request.
pub fn linked_issues(pr: &PullRequest) -> Vec<Reference> {
    let Some(host) = url_host(&pr.html_url) else {
        return Vec::new();
    };
    Reference::scan_in_org(pr.body_text(), host, &pr.org)
        .into_iter()
        .map(|r| r.as_issue())
        .collect()
}

/// Notify every linked issue about each of `branches`.
///
/// Best effort: inaccessible issues are skipped and API failures are
/// counted, never returned.
pub async fn notify_linked_issues(
    host: &dyn CodeHost,
    pr: &PullRequest,
    branches: &[String],
) -> NotificationSummary {
    let mut summary = NotificationSummary::default();
    if branches.is_empty() {
        return summary;
    }

    for issue in linked_issues(pr) {
        match host.issue(&issue).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(issue = %issue, error = %e, "linked issue not accessible, skipping");
                summary.inaccessible += 1;
                continue;
            }
            Err(e) => {
                warn!(issue = %issue, error = %e, "can't read linked issue");
                summary.failed += 1;
                continue;
            }
        }

        let mut existing: Vec<String> = match host.issue_comments(&issue).await {
            Ok(comments) => comments
                .into_iter()
                .map(|c| c.body.unwrap_or_default())
                .collect(),
            Err(e) => {
                warn!(issue = %issue, error = %e, "can't list comments, skipping issue");
                summary.failed += 1;
                continue;
            }
        };

        for branch in branches {
            let body = comment_body(&pr.html_url, branch);
            if existing.iter().any(|c| c.contains(&body)) {
                summary.skipped_duplicate += 1;
                continue;
            }

            match host.create_issue_comment(&issue, &body).await {
                Ok(_) => {
                    info!(issue = %issue, branch = %branch, "posted backport notification");
                    summary.posted += 1;
                    existing.push(body);
                }
                Err(e) => {
                    warn!(issue = %issue, branch = %branch, error = %e, "can't post notification");
                    summary.failed += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryCodeHost;
    use crate::references::ReferenceKind;

    fn pr(body: &str) -> PullRequest {
        PullRequest {
            org: "acme".to_string(),
            repo: "api".to_string(),
            number: 7,
            title: "Fix bug".to_string(),
            html_url: "https://github.com/acme/api/pull/7".to_string(),
            state: "closed".to_string(),
            merge_commit_sha: Some("abc".to_string()),
            body: Some(body.to_string()),
        }
    }

    fn issue10() -> Reference {
        Reference::new("acme", "api", ReferenceKind::Issue, 10)
    }

    #[test]
    fn comment_body_encodes_url_and_branch() {
        let body = comment_body("https://github.com/acme/api/pull/7", "release-1.0");
        assert!(body.starts_with("https://github.com/acme/api/pull/7 was merged to `release-1.0` branch"));
        assert!(body.contains("Created via API"));
    }

    #[test]
    fn linked_issues_ignore_other_orgs() {
        let p = pr("Fixes https://github.com/acme/api/issues/10, \
                    https://github.com/other/lib/issues/2 and https://github.com/acme/web/pull/3");
        let issues = linked_issues(&p);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind == ReferenceKind::Issue));
        assert_eq!(issues[1].repo, "web");
    }

    #[tokio::test]
    async fn repeated_runs_post_exactly_once() {
        let host = MemoryCodeHost::new();
        host.add_issue(&issue10(), "Bug");
        let p = pr("Fixes https://github.com/acme/api/issues/10");
        let branches = vec!["release-1.0".to_string()];

        let first = notify_linked_issues(&host, &p, &branches).await;
        assert_eq!(first.posted, 1);

        let second = notify_linked_issues(&host, &p, &branches).await;
        assert_eq!(second.posted, 0);
        assert_eq!(second.skipped_duplicate, 1);

        let expected = comment_body(&p.html_url, "release-1.0");
        let matching = host
            .comments_on(&issue10())
            .iter()
            .filter(|c| c.contains(&expected))
            .count();
        assert_eq!(matching, 1);
    }

    #[tokio::test]
    async fn duplicate_branches_in_one_run_post_once() {
        let host = MemoryCodeHost::new();
        host.add_issue(&issue10(), "Bug");
        let p = pr("https://github.com/acme/api/issues/10");
        let branches = vec!["release-1.0".to_string(), "release-1.0".to_string()];

        let summary = notify_linked_issues(&host, &p, &branches).await;
        assert_eq!(summary.posted, 1);
        assert_eq!(summary.skipped_duplicate, 1);
    }

    #[tokio::test]
    async fn inaccessible_issue_is_skipped() {
        let host = MemoryCodeHost::new();
        let p = pr("See https://github.com/acme/api/issues/404");
        let summary =
            notify_linked_issues(&host, &p, &["main".to_string()]).await;
        assert_eq!(summary.inaccessible, 1);
        assert_eq!(summary.posted, 0);
    }

    #[tokio::test]
    async fn hidden_issue_is_inaccessible_but_server_error_is_a_failure() {
        let host = MemoryCodeHost::new();
        let hidden = Reference::new("acme", "api", ReferenceKind::Issue, 11);
        host.add_issue(&issue10(), "Bug");
        host.add_issue(&hidden, "Private");
        host.fail_issue_lookup(&issue10(), 500);
        host.fail_issue_lookup(&hidden, 403);
        let p = pr("https://github.com/acme/api/issues/10 https://github.com/acme/api/issues/11");

        let summary = notify_linked_issues(&host, &p, &["main".to_string()]).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inaccessible, 1);
        assert_eq!(host.comment_count(), 0);
    }

    #[test]
    fn linked_issues_stay_on_the_pull_request_host() {
        let p = pr("Ported from https://gitlab.com/acme/api/issues/3, fixes \
                    https://github.com/acme/api/issues/10");
        assert_eq!(linked_issues(&p), vec![issue10()]);
    }

    #[tokio::test]
    async fn comment_failure_is_counted_not_raised() {
        let host = MemoryCodeHost::new();
        host.add_issue(&issue10(), "Bug");
        host.fail_comment_creation(true);
        let p = pr("https://github.com/acme/api/issues/10");
        let summary =
            notify_linked_issues(&host, &p, &["main".to_string(), "release-1.0".to_string()]).await;
        assert_eq!(summary.failed, 2);
        assert!(host.comments_on(&issue10()).is_empty());
    }
}
