//! GitHub REST implementation of [`CodeHost`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CodeHost, Comment, Issue, Project, ProjectCard, ProjectColumn, PullRequest, TimelineEvent};
use crate::error::{BackportError, BackportResult};
use crate::references::Reference;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
/// Classic project boards and the issue timeline still sit behind previews.
const PREVIEW_MEDIA_TYPE: &str =
    "application/vnd.github.inertia-preview+json, application/vnd.github.mockingbird-preview+json";
const PER_PAGE: u32 = 100;

/// Authenticated GitHub API client, built once at startup and passed down.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    #[serde(default)]
    title: String,
    html_url: String,
    state: String,
    #[serde(default)]
    merge_commit_sha: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(token: &str, api_url: &str) -> BackportResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| BackportError::Config("github token contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("backport/", env!("CARGO_PKG_VERSION"))),
        );

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn check(endpoint: &str, response: Response) -> BackportResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        Err(BackportError::Api {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, accept: &str) -> BackportResult<T> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .header(ACCEPT, accept)
            .send()
            .await?;
        let response = Self::check(path, response).await?;
        Ok(response.json().await?)
    }

    /// GET every page of a list endpoint, following `Link: rel="next"`.
    async fn get_all<T: DeserializeOwned>(&self, path: &str, accept: &str) -> BackportResult<Vec<T>> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut next = Some(self.url(&format!("{path}{separator}per_page={PER_PAGE}")));
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            debug!(url = %url, "GET page");
            let response = self.http.get(&url).header(ACCEPT, accept).send().await?;
            let response = Self::check(path, response).await?;
            next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(next_page_url);
            let page: Vec<T> = response.json().await?;
            items.extend(page);
        }

        Ok(items)
    }

    fn issue_path(issue: &Reference) -> String {
        format!("/repos/{}/{}/issues/{}", issue.org, issue.repo, issue.number)
    }
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn pull_request(&self, pr: &Reference) -> BackportResult<PullRequest> {
        let path = format!("/repos/{}/{}/pulls/{}", pr.org, pr.repo, pr.number);
        let raw: PullRequestResponse = self.get_json(&path, JSON_MEDIA_TYPE).await?;
        Ok(PullRequest {
            org: pr.org.clone(),
            repo: pr.repo.clone(),
            number: raw.number,
            title: raw.title,
            html_url: raw.html_url,
            state: raw.state,
            merge_commit_sha: raw.merge_commit_sha,
            body: raw.body,
        })
    }

    async fn issue(&self, issue: &Reference) -> BackportResult<Issue> {
        self.get_json(&Self::issue_path(issue), JSON_MEDIA_TYPE).await
    }

    async fn issue_comments(&self, issue: &Reference) -> BackportResult<Vec<Comment>> {
        let path = format!("{}/comments", Self::issue_path(issue));
        self.get_all(&path, JSON_MEDIA_TYPE).await
    }

    async fn create_issue_comment(
        &self,
        issue: &Reference,
        body: &str,
    ) -> BackportResult<Comment> {
        let path = format!("{}/comments", Self::issue_path(issue));
        debug!(path = %path, "POST");
        let response = self
            .http
            .post(self.url(&path))
            .json(&CreateCommentRequest { body })
            .send()
            .await?;
        let response = Self::check(&path, response).await?;
        Ok(response.json().await?)
    }

    async fn issue_timeline(&self, issue: &Reference) -> BackportResult<Vec<TimelineEvent>> {
        let path = format!("{}/timeline", Self::issue_path(issue));
        self.get_all(&path, PREVIEW_MEDIA_TYPE).await
    }

    async fn org_projects(&self, org: &str) -> BackportResult<Vec<Project>> {
        self.get_all(&format!("/orgs/{org}/projects"), PREVIEW_MEDIA_TYPE)
            .await
    }

    async fn project_columns(&self, project_id: u64) -> BackportResult<Vec<ProjectColumn>> {
        self.get_all(&format!("/projects/{project_id}/columns"), PREVIEW_MEDIA_TYPE)
            .await
    }

    async fn column_cards(&self, column_id: u64) -> BackportResult<Vec<ProjectCard>> {
        self.get_all(
            &format!("/projects/columns/{column_id}/cards"),
            PREVIEW_MEDIA_TYPE,
        )
        .await
    }
}
