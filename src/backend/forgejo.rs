use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ForgeApi, IssueBackend};
use crate::error::{ApiError, IssueError};
use crate::issue::Issue;
use crate::project::Project;
use crate::types::{
    IssueEdit, IssueListFilter, ListCriteria, NewIssue, RawComment, RawIssue, RawLabel, RawRepo,
};

/// Message fragment Forgejo uses when a user filter names an unknown user
const USER_MISSING: &str = "user does not exist";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Forgejo (and Gitea) REST API client
pub struct ForgejoApi {
    http: Client,
    api_base: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Labels are not part of the create body: Forgejo expects label ids there,
/// so names are attached with a follow-up call
#[derive(Serialize)]
struct CreateIssueOption<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignees: Option<&'a [String]>,
}

#[derive(Serialize)]
struct LabelsOption<'a> {
    labels: &'a [String],
}

#[derive(Serialize)]
struct CommentOption<'a> {
    body: &'a str,
}

impl ForgejoApi {
    /// Create a client for the instance at `instance_url`, optionally authenticated
    pub fn new(instance_url: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("token {}", token.trim()))
                .map_err(|e| ApiError::Transport(format!("invalid authorization header: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(concat!("forgeissues/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create forgejo client: {e}")))?;

        Ok(Self {
            http,
            api_base: format!("{}/api/v1", instance_url.trim_end_matches('/')),
        })
    }

    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base, owner, repo, path)
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        debug!(operation, "forgejo request");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("{operation}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.message)
            .unwrap_or(text);
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T, ApiError> {
        self.execute(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{operation}: {e}")))
    }
}

#[async_trait]
impl ForgeApi for ForgejoApi {
    async fn repository_get(&self, owner: &str, repo: &str) -> Result<RawRepo, ApiError> {
        self.send("get repository", self.http.get(self.repo_url(owner, repo, "")))
            .await
    }

    async fn issue_create(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: Option<&[String]>,
        assignees: Option<&[String]>,
    ) -> Result<RawIssue, ApiError> {
        let option = CreateIssueOption {
            title,
            body,
            assignees,
        };
        let request = self.http.post(self.repo_url(owner, repo, "/issues")).json(&option);
        let issue: RawIssue = self.send("create issue", request).await?;

        match labels {
            Some(labels) if !labels.is_empty() => {
                self.issue_add_label(owner, repo, issue.number, labels).await?;
                self.issue_get(owner, repo, issue.number).await
            }
            _ => Ok(issue),
        }
    }

    async fn issue_get(&self, owner: &str, repo: &str, index: u64) -> Result<RawIssue, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}"));
        self.send("get issue", self.http.get(url)).await
    }

    async fn issue_list(
        &self,
        owner: &str,
        repo: &str,
        criteria: &ListCriteria,
    ) -> Result<Vec<RawIssue>, ApiError> {
        let mut query: Vec<(&str, String)> = vec![("state", criteria.state.clone())];
        if let Some(kind) = &criteria.kind {
            query.push(("type", kind.clone()));
        }
        if let Some(author) = &criteria.created_by {
            query.push(("created_by", author.clone()));
        }
        if let Some(assignee) = &criteria.assigned_by {
            query.push(("assigned_by", assignee.clone()));
        }
        if let Some(labels) = &criteria.labels {
            query.push(("labels", labels.join(",")));
        }

        let request = self.http.get(self.repo_url(owner, repo, "/issues")).query(&query);
        self.send("list issues", request).await
    }

    async fn issue_edit(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        edit: &IssueEdit,
    ) -> Result<RawIssue, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}"));
        self.send("edit issue", self.http.patch(url).json(edit)).await
    }

    async fn issue_add_label(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        labels: &[String],
    ) -> Result<(), ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}/labels"));
        self.execute("add labels", self.http.post(url).json(&LabelsOption { labels }))
            .await?;
        Ok(())
    }

    async fn issue_get_labels(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawLabel>, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}/labels"));
        self.send("get labels", self.http.get(url)).await
    }

    async fn issue_create_comment(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}/comments"));
        self.send("create comment", self.http.post(url).json(&CommentOption { body }))
            .await
    }

    async fn issue_get_comments(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawComment>, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/{index}/comments"));
        self.send("get comments", self.http.get(url)).await
    }

    async fn issue_get_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<RawComment, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/comments/{id}"));
        self.send("get comment", self.http.get(url)).await
    }

    async fn issue_edit_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let url = self.repo_url(owner, repo, &format!("/issues/comments/{id}"));
        self.send("edit comment", self.http.patch(url).json(&CommentOption { body }))
            .await
    }
}

/// Issue operations for Forgejo projects
pub struct ForgejoIssues;

/// Build the listing criteria; the issues endpoint also serves pull
/// requests, so the `issues` type is always requested
pub(crate) fn list_criteria(filter: &IssueListFilter) -> ListCriteria {
    ListCriteria {
        state: filter.status.as_str().to_string(),
        kind: Some("issues".to_string()),
        created_by: filter.author.clone(),
        assigned_by: filter.assignee.clone(),
        labels: filter.labels.clone(),
    }
}

#[async_trait]
impl IssueBackend for ForgejoIssues {
    async fn create_issue(
        &self,
        project: &Arc<Project>,
        new: NewIssue,
    ) -> Result<Issue, IssueError> {
        if new.private.unwrap_or(false) {
            return Err(IssueError::NotImplemented(
                "private issues are not supported by Forgejo".to_string(),
            ));
        }
        project.ensure_issues_enabled().await?;

        let raw = project
            .api()
            .issue_create(
                project.namespace(),
                project.repo(),
                &new.title,
                &new.body,
                new.labels.as_deref(),
                new.assignees.as_deref(),
            )
            .await
            .map_err(|e| IssueError::request_failed(format!("failed to create issue in {project}"), e))?;

        Issue::from_raw(project.clone(), raw)
    }

    async fn get_issue(&self, project: &Arc<Project>, index: u64) -> Result<Issue, IssueError> {
        project.ensure_issues_enabled().await?;

        let raw = project
            .api()
            .issue_get(project.namespace(), project.repo(), index)
            .await
            .map_err(|e| IssueError::not_supported(format!("issue {index} not found"), e))?;

        if raw.pull_request.is_some() {
            return Err(IssueError::OperationNotSupported {
                message: format!("#{index} is a pull request, not an issue"),
                source: None,
            });
        }

        Issue::from_raw(project.clone(), raw)
    }

    async fn list_issues(
        &self,
        project: &Arc<Project>,
        filter: IssueListFilter,
    ) -> Result<Vec<Issue>, IssueError> {
        project.ensure_issues_enabled().await?;

        let criteria = list_criteria(&filter);
        let issues = match project
            .api()
            .issue_list(project.namespace(), project.repo(), &criteria)
            .await
        {
            Ok(issues) => issues,
            Err(e) if e.is_not_found() && e.message().contains(USER_MISSING) => {
                warn!(project = %project, error = %e, "filter user does not exist, no issues match");
                return Ok(Vec::new());
            }
            Err(e) => return Err(IssueError::listing_failed(e)),
        };

        issues
            .into_iter()
            .map(|raw| Issue::from_raw(project.clone(), raw))
            .collect()
    }
}
