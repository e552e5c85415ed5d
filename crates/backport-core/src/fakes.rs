//! In-memory fakes for collaborator traits (testing only)
//!
//! [`MemoryCodeHost`] satisfies the [`CodeHost`] contract without network
//! access and records every comment it is asked to create.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{BackportError, BackportResult};
use crate::hosting::{
    CodeHost, Comment, Issue, Project, ProjectCard, ProjectColumn, PullRequest, TimelineEvent,
};
use crate::references::Reference;

type Key = (String, String, u64);

fn key(r: &Reference) -> Key {
    (r.org.clone(), r.repo.clone(), r.number)
}

fn not_found(endpoint: String) -> BackportError {
    BackportError::Api {
        status: 404,
        endpoint,
        message: "Not Found".to_string(),
    }
}

#[derive(Debug, Default)]
struct State {
    pulls: HashMap<Key, PullRequest>,
    issues: HashMap<Key, Issue>,
    comments: HashMap<Key, Vec<Comment>>,
    timelines: HashMap<Key, Vec<TimelineEvent>>,
    projects: HashMap<String, Vec<Project>>,
    columns: HashMap<u64, Vec<ProjectColumn>>,
    cards: HashMap<u64, Vec<ProjectCard>>,
    issue_errors: HashMap<Key, u16>,
}

/// In-memory hosting service.
#[derive(Debug, Default)]
pub struct MemoryCodeHost {
    state: Mutex<State>,
    next_id: AtomicU64,
    fail_comments: AtomicBool,
}

impl MemoryCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a pull request; it is also visible as an issue.
    pub fn add_pull_request(&self, pr: PullRequest) {
        let k = (pr.org.clone(), pr.repo.clone(), pr.number);
        let mut state = self.state.lock().unwrap();
        state.issues.insert(
            k.clone(),
            Issue {
                number: pr.number,
                title: pr.title.clone(),
                html_url: pr.html_url.clone(),
                state: pr.state.clone(),
            },
        );
        state.pulls.insert(k, pr);
    }

    pub fn add_issue(&self, issue: &Reference, title: &str) {
        let mut state = self.state.lock().unwrap();
        state.issues.insert(
            key(issue),
            Issue {
                number: issue.number,
                title: title.to_string(),
                html_url: issue.as_issue().html_url(),
                state: "open".to_string(),
            },
        );
    }

    pub fn add_comment(&self, issue: &Reference, body: &str) {
        let id = self.next_id();
        let mut state = self.state.lock().unwrap();
        state.comments.entry(key(issue)).or_default().push(Comment {
            id,
            body: Some(body.to_string()),
            created_at: Some(Utc::now()),
        });
    }

    pub fn add_timeline_event(&self, issue: &Reference, event: TimelineEvent) {
        let mut state = self.state.lock().unwrap();
        state.timelines.entry(key(issue)).or_default().push(event);
    }

    pub fn add_project(&self, org: &str, project: Project) {
        let mut state = self.state.lock().unwrap();
        state.projects.entry(org.to_string()).or_default().push(project);
    }

    pub fn add_column(&self, project_id: u64, column: ProjectColumn) {
        let mut state = self.state.lock().unwrap();
        state.columns.entry(project_id).or_default().push(column);
    }

    pub fn add_card(&self, column_id: u64, card: ProjectCard) {
        let mut state = self.state.lock().unwrap();
        state.cards.entry(column_id).or_default().push(card);
    }

    /// Make every `create_issue_comment` call fail.
    pub fn fail_comment_creation(&self, fail: bool) {
        self.fail_comments.store(fail, Ordering::SeqCst);
    }

    /// Make reads of `issue` answer with HTTP `status`.
    pub fn fail_issue_lookup(&self, issue: &Reference, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.issue_errors.insert(key(issue), status);
    }

    /// Bodies of all comments on `issue`, oldest first.
    pub fn comments_on(&self, issue: &Reference) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .comments
            .get(&key(issue))
            .map(|cs| cs.iter().map(|c| c.body_text().to_string()).collect())
            .unwrap_or_default()
    }

    /// Total number of comments across all issues.
    pub fn comment_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.comments.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl CodeHost for MemoryCodeHost {
    async fn pull_request(&self, pr: &Reference) -> BackportResult<PullRequest> {
        let state = self.state.lock().unwrap();
        state
            .pulls
            .get(&key(pr))
            .cloned()
            .ok_or_else(|| not_found(format!("pulls/{pr}")))
    }

    async fn issue(&self, issue: &Reference) -> BackportResult<Issue> {
        let state = self.state.lock().unwrap();
        if let Some(&status) = state.issue_errors.get(&key(issue)) {
            return Err(BackportError::Api {
                status,
                endpoint: format!("issues/{issue}"),
                message: "lookup disabled".to_string(),
            });
        }
        state
            .issues
            .get(&key(issue))
            .cloned()
            .ok_or_else(|| not_found(format!("issues/{issue}")))
    }

    async fn issue_comments(&self, issue: &Reference) -> BackportResult<Vec<Comment>> {
        let state = self.state.lock().unwrap();
        if !state.issues.contains_key(&key(issue)) {
            return Err(not_found(format!("issues/{issue}/comments")));
        }
        Ok(state.comments.get(&key(issue)).cloned().unwrap_or_default())
    }

    async fn create_issue_comment(
        &self,
        issue: &Reference,
        body: &str,
    ) -> BackportResult<Comment> {
        if self.fail_comments.load(Ordering::SeqCst) {
            return Err(BackportError::Api {
                status: 500,
                endpoint: format!("issues/{issue}/comments"),
                message: "comment creation disabled".to_string(),
            });
        }
        let comment = Comment {
            id: self.next_id(),
            body: Some(body.to_string()),
            created_at: Some(Utc::now()),
        };
        let mut state = self.state.lock().unwrap();
        if !state.issues.contains_key(&key(issue)) {
            return Err(not_found(format!("issues/{issue}/comments")));
        }
        state
            .comments
            .entry(key(issue))
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    async fn issue_timeline(&self, issue: &Reference) -> BackportResult<Vec<TimelineEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state.timelines.get(&key(issue)).cloned().unwrap_or_default())
    }

    async fn org_projects(&self, org: &str) -> BackportResult<Vec<Project>> {
        let state = self.state.lock().unwrap();
        Ok(state.projects.get(org).cloned().unwrap_or_default())
    }

    async fn project_columns(&self, project_id: u64) -> BackportResult<Vec<ProjectColumn>> {
        let state = self.state.lock().unwrap();
        Ok(state.columns.get(&project_id).cloned().unwrap_or_default())
    }

    async fn column_cards(&self, column_id: u64) -> BackportResult<Vec<ProjectCard>> {
        let state = self.state.lock().unwrap();
        Ok(state.cards.get(&column_id).cloned().unwrap_or_default())
    }
}
