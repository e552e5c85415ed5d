//! Code-hosting API abstraction.
//!
//! [`CodeHost`] is the only way the engine talks to the hosting service.
//! [`github::GitHubClient`] implements it over REST; tests use
//! [`crate::fakes::MemoryCodeHost`].

pub mod github;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackportResult;
use crate::references::Reference;

pub use github::GitHubClient;

/// A pull request as read once at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub merge_commit_sha: Option<String>,
    pub body: Option<String>,
}

impl PullRequest {
    /// Closed pull requests are the only ones that may be released.
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// One entry of an issue timeline; only cross-references are of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub source: Option<TimelineSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSource {
    #[serde(default)]
    pub issue: Option<TimelineIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineIssue {
    pub html_url: String,
}

impl TimelineEvent {
    /// A `cross-referenced` event pointing from `source_url`.
    pub fn cross_reference(source_url: &str) -> Self {
        Self {
            event: Some("cross-referenced".to_string()),
            source: Some(TimelineSource {
                issue: Some(TimelineIssue {
                    html_url: source_url.to_string(),
                }),
            }),
        }
    }

    /// URL of the referencing issue or pull request for cross-reference events.
    pub fn cross_reference_url(&self) -> Option<&str> {
        if self.event.as_deref() != Some("cross-referenced") {
            return None;
        }
        self.source
            .as_ref()
            .and_then(|s| s.issue.as_ref())
            .map(|i| i.html_url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectColumn {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCard {
    pub id: u64,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Operations the engine and the board walker need from the hosting service.
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn pull_request(&self, pr: &Reference) -> BackportResult<PullRequest>;

    async fn issue(&self, issue: &Reference) -> BackportResult<Issue>;

    async fn issue_comments(&self, issue: &Reference) -> BackportResult<Vec<Comment>>;

    async fn create_issue_comment(&self, issue: &Reference, body: &str)
        -> BackportResult<Comment>;

    async fn issue_timeline(&self, issue: &Reference) -> BackportResult<Vec<TimelineEvent>>;

    async fn org_projects(&self, org: &str) -> BackportResult<Vec<Project>>;

    async fn project_columns(&self, project_id: u64) -> BackportResult<Vec<ProjectColumn>>;

    async fn column_cards(&self, column_id: u64) -> BackportResult<Vec<ProjectCard>>;
}
