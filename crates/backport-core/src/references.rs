//! Structured parsing of issue, pull request and project references.
//!
//! Every place that needs to understand a hosting URL goes through
//! [`Reference`] or [`ProjectRef`]: the command layer parsing its target,
//! the notifier scanning pull request descriptions, and the board walker
//! turning card content URLs into issues.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BackportError, BackportResult};

/// Whether a reference points at an issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Issue,
    Pull,
}

impl ReferenceKind {
    fn from_segment(segment: &str) -> Self {
        match segment {
            "pull" | "pulls" => ReferenceKind::Pull,
            _ => ReferenceKind::Issue,
        }
    }

    fn html_segment(self) -> &'static str {
        match self {
            ReferenceKind::Issue => "issues",
            ReferenceKind::Pull => "pull",
        }
    }
}

/// A typed `{org, repo, kind, number}` pointer at an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub org: String,
    pub repo: String,
    pub kind: ReferenceKind,
    pub number: u64,
}

fn html_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https?://[^/\s]+/([^/\s]+)/([^/\s]+)/(issues|pull)/(\d+)")
            .expect("html reference pattern is valid")
    })
}

fn api_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https?://[^/\s]+/(?:api/v3/)?repos/([^/\s]+)/([^/\s]+)/(issues|pulls)/(\d+)")
            .expect("api reference pattern is valid")
    })
}

fn project_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https?://[^/\s]+/orgs/([^/\s]+)/projects/(\d+)")
            .expect("project pattern is valid")
    })
}

/// Host part of an `http(s)://host/...` URL.
pub fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split('/').next()?;
    (!host.is_empty()).then_some(host)
}

/// Only accept a match that covers the whole input up to an optional path,
/// query or fragment suffix (`/files`, `#issuecomment-1`, ...).
fn is_full_match(input: &str, start: usize, end: usize) -> bool {
    start == 0 && matches!(input[end..].chars().next(), None | Some('/' | '?' | '#'))
}

impl Reference {
    pub fn new(org: &str, repo: &str, kind: ReferenceKind, number: u64) -> Self {
        Self {
            org: org.to_string(),
            repo: repo.to_string(),
            kind,
            number,
        }
    }

    /// Parse a browser URL or an API content URL.
    pub fn parse_url(url: &str) -> BackportResult<Self> {
        let url = url.trim();
        for re in [api_pattern(), html_pattern()] {
            if let Some(caps) = re.captures(url) {
                let whole = caps.get(0).expect("capture 0 always present");
                if is_full_match(url, whole.start(), whole.end()) {
                    return Self::from_captures(&caps, url);
                }
            }
        }
        Err(BackportError::InvalidReference(url.to_string()))
    }

    /// Parse a command target: either a URL or a `repo/number` pair
    /// resolved against `default_org`.
    pub fn parse_target(target: &str, default_org: Option<&str>) -> BackportResult<Self> {
        let target = target.trim();
        if target.starts_with("http") {
            return Self::parse_url(target);
        }

        let (repo, number) = target.split_once('/').ok_or_else(|| {
            BackportError::Config(format!(
                "target `{target}` should have <repo>/<pr-num> format or be a URL to a pull request"
            ))
        })?;
        if repo.is_empty() || number.is_empty() {
            return Err(BackportError::Config(format!(
                "target `{target}` should have <repo>/<pr-num> format or be a URL to a pull request"
            )));
        }
        let number = number
            .parse::<u64>()
            .map_err(|_| BackportError::InvalidReference(format!("`{number}` is not a number")))?;
        let org = default_org.filter(|o| !o.is_empty()).ok_or_else(|| {
            BackportError::Config(format!(
                "target `{target}` needs an organisation (--org or GITHUB_ORG)"
            ))
        })?;

        Ok(Self::new(org, repo, ReferenceKind::Pull, number))
    }

    /// References in `text` that point at `host` and belong to `org`.
    pub fn scan_in_org(text: &str, host: &str, org: &str) -> Vec<Self> {
        html_pattern()
            .captures_iter(text)
            .filter(|caps| {
                caps.get(0)
                    .and_then(|m| url_host(m.as_str()))
                    .is_some_and(|h| h.eq_ignore_ascii_case(host))
            })
            .filter_map(|caps| Self::from_captures(&caps, text).ok())
            .filter(|r| r.org.eq_ignore_ascii_case(org))
            .collect()
    }

    /// Canonical browser URL on `github.com`.
    pub fn html_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/{}/{}",
            self.org,
            self.repo,
            self.kind.html_segment(),
            self.number
        )
    }

    /// The same reference viewed as an issue (pull requests are issues on the API).
    pub fn as_issue(&self) -> Self {
        Self {
            kind: ReferenceKind::Issue,
            ..self.clone()
        }
    }

    fn from_captures(caps: &regex::Captures<'_>, input: &str) -> BackportResult<Self> {
        let number = caps[4]
            .parse::<u64>()
            .map_err(|_| BackportError::InvalidReference(input.to_string()))?;
        Ok(Self {
            org: caps[1].to_string(),
            repo: caps[2].to_string(),
            kind: ReferenceKind::from_segment(&caps[3]),
            number,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

/// An organisation project board, `https://github.com/orgs/<org>/projects/<n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub org: String,
    pub number: u64,
}

impl ProjectRef {
    pub fn parse(url: &str) -> BackportResult<Self> {
        let url = url.trim();
        let caps = project_pattern()
            .captures(url)
            .ok_or_else(|| BackportError::Config(format!("project url not recognised: `{url}`")))?;
        let number = caps[2]
            .parse::<u64>()
            .map_err(|_| BackportError::InvalidReference(url.to_string()))?;
        Ok(Self {
            org: caps[1].to_string(),
            number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pull_url() {
        let r = Reference::parse_url("https://github.com/acme/gateway/pull/1234").unwrap();
        assert_eq!(r, Reference::new("acme", "gateway", ReferenceKind::Pull, 1234));
    }

    #[test]
    fn parse_url_with_suffix() {
        let r = Reference::parse_url("https://github.com/acme/gateway/pull/12/files").unwrap();
        assert_eq!(r.number, 12);
        let r = Reference::parse_url("https://github.com/acme/gateway/issues/3#issuecomment-9")
            .unwrap();
        assert_eq!(r.kind, ReferenceKind::Issue);
        assert_eq!(r.number, 3);
    }

    #[test]
    fn parse_api_content_url() {
        let r = Reference::parse_url("https://api.github.com/repos/acme/gateway/issues/55").unwrap();
        assert_eq!(r, Reference::new("acme", "gateway", ReferenceKind::Issue, 55));

        let r = Reference::parse_url("https://api.github.com/repos/acme/gateway/pulls/56").unwrap();
        assert_eq!(r.kind, ReferenceKind::Pull);
    }

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(Reference::parse_url("https://github.com/acme/gateway").is_err());
        assert!(Reference::parse_url("see https://github.com/acme/gateway/pull/1").is_err());
        assert!(Reference::parse_url("https://github.com/acme/gateway/pull/12abc").is_err());
    }

    #[test]
    fn parse_target_repo_number_pair() {
        let r = Reference::parse_target("gateway/42", Some("acme")).unwrap();
        assert_eq!(r, Reference::new("acme", "gateway", ReferenceKind::Pull, 42));
    }

    #[test]
    fn parse_target_url_ignores_default_org() {
        let r = Reference::parse_target("https://github.com/other/dash/pull/9", Some("acme"))
            .unwrap();
        assert_eq!(r.org, "other");
    }

    #[test]
    fn parse_target_errors() {
        assert!(matches!(
            Reference::parse_target("gateway", Some("acme")),
            Err(BackportError::Config(_))
        ));
        assert!(matches!(
            Reference::parse_target("gateway/abc", Some("acme")),
            Err(BackportError::InvalidReference(_))
        ));
        assert!(matches!(
            Reference::parse_target("gateway/4", None),
            Err(BackportError::Config(_))
        ));
    }

    #[test]
    fn scan_keeps_order_and_filters_org() {
        let body = "Fixes https://github.com/acme/gateway/issues/10 and \
                    https://github.com/elsewhere/lib/issues/2, see also \
                    https://github.com/acme/dashboard/pull/11.";
        let ours = Reference::scan_in_org(body, "github.com", "acme");
        assert_eq!(ours.len(), 2);
        assert_eq!(ours[0].number, 10);
        assert_eq!(ours[1].repo, "dashboard");
        assert_eq!(ours[1].kind, ReferenceKind::Pull);
    }

    #[test]
    fn scan_ignores_links_on_other_hosts() {
        let body = "Mirrors https://gitlab.com/acme/api/issues/3 and fixes \
                    https://GitHub.com/acme/api/issues/10";
        let ours = Reference::scan_in_org(body, "github.com", "acme");
        assert_eq!(ours, vec![Reference::new("acme", "api", ReferenceKind::Issue, 10)]);

        let enterprise = Reference::scan_in_org(
            "https://git.corp.example/acme/api/issues/4",
            "git.corp.example",
            "acme",
        );
        assert_eq!(enterprise.len(), 1);
    }

    #[test]
    fn url_host_extracts_authority() {
        assert_eq!(url_host("https://github.com/acme/api/pull/7"), Some("github.com"));
        assert_eq!(url_host("http://ghe.local:8080/x"), Some("ghe.local:8080"));
        assert_eq!(url_host("/tmp/remotes"), None);
    }

    #[test]
    fn html_url_round_trips_display() {
        let r = Reference::new("acme", "gateway", ReferenceKind::Issue, 10);
        assert_eq!(r.html_url(), "https://github.com/acme/gateway/issues/10");
        assert_eq!(r.to_string(), "acme/gateway#10");
        assert_eq!(
            Reference::new("acme", "gateway", ReferenceKind::Pull, 1)
                .as_issue()
                .kind,
            ReferenceKind::Issue
        );
    }

    #[test]
    fn parse_project_url() {
        let p = ProjectRef::parse("https://github.com/orgs/acme/projects/7").unwrap();
        assert_eq!(p, ProjectRef { org: "acme".to_string(), number: 7 });
        assert!(ProjectRef::parse("https://github.com/acme/gateway").is_err());
    }
}
