use async_trait::async_trait;
use octocrab::models::issues::{Comment as GhComment, Issue as GhIssue};
use octocrab::models::{CommentId, IssueState, Repository};
use octocrab::params::State;
use octocrab::Octocrab;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ForgeApi, IssueBackend};
use crate::error::{ApiError, IssueError};
use crate::issue::Issue;
use crate::project::Project;
use crate::types::{
    AssigneeRef, IssueEdit, IssueListFilter, ListCriteria, NewIssue, RawComment, RawIssue,
    RawLabel, RawPullRequestRef, RawRepo, RawUser,
};

/// GitHub API client using octocrab
pub struct GitHubApi {
    client: Octocrab,
}

impl GitHubApi {
    /// Create a new GitHub client with a personal access token
    pub fn new(token: &str) -> Result<Self, ApiError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| map_error("create client", e))?;

        Ok(Self { client })
    }
}

/// Request fields GitHub reports as invalid when a user filter names an unknown user
const USER_FILTER_FIELDS: [&str; 2] = ["creator", "assignee"];

/// Translate octocrab failures into the shared vocabulary
fn map_error(operation: &str, error: octocrab::Error) -> ApiError {
    match error {
        octocrab::Error::GitHub { source, .. } => {
            let errors = source.errors.as_deref().unwrap_or_default();
            let message = describe_errors(&source.message, errors);
            ApiError::from_status(source.status_code.as_u16(), message)
        }
        other => ApiError::Transport(format!("{operation}: {other}")),
    }
}

/// Append the per-field validation errors to the top-level message,
/// e.g. `Validation Failed [field: creator, code: invalid]`
fn describe_errors(message: &str, errors: &[serde_json::Value]) -> String {
    let details: Vec<String> = errors
        .iter()
        .filter_map(|e| {
            let field = e.get("field")?.as_str()?;
            let code = e.get("code").and_then(|c| c.as_str()).unwrap_or("invalid");
            Some(format!("[field: {field}, code: {code}]"))
        })
        .collect();

    if details.is_empty() {
        message.to_string()
    } else {
        format!("{message} {}", details.join(" "))
    }
}

/// Whether a 422 was caused by a creator or assignee filter naming an unknown user
fn rejects_filter_user(error: &ApiError) -> bool {
    matches!(error, ApiError::Unprocessable { .. })
        && USER_FILTER_FIELDS
            .iter()
            .any(|field| error.message().contains(&format!("[field: {field},")))
}

/// Convert octocrab issue to our raw issue
fn convert_issue(issue: GhIssue) -> RawIssue {
    let state = match issue.state {
        IssueState::Open => "open",
        IssueState::Closed => "closed",
        _ => "unknown",
    };

    RawIssue {
        number: issue.number,
        id: issue.id.0,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        url: issue.html_url.to_string(),
        user: RawUser {
            login: issue.user.login,
        },
        created_at: issue.created_at,
        state: state.to_string(),
        assignees: Some(
            issue
                .assignees
                .into_iter()
                .map(|a| AssigneeRef { login: a.login })
                .collect(),
        ),
        pull_request: issue.pull_request.map(|_| RawPullRequestRef::default()),
    }
}

fn convert_repo(repository: Repository, owner: &str, repo: &str) -> RawRepo {
    RawRepo {
        full_name: repository
            .full_name
            .unwrap_or_else(|| format!("{owner}/{repo}")),
        has_issues: repository.has_issues.unwrap_or(true),
    }
}

fn convert_comment(comment: GhComment) -> RawComment {
    RawComment {
        id: comment.id.0,
        body: comment.body.unwrap_or_default(),
        user: RawUser {
            login: comment.user.login,
        },
        created_at: comment.created_at,
        updated_at: comment.updated_at.unwrap_or(comment.created_at),
    }
}

fn list_state(state: &str) -> State {
    match state {
        "closed" => State::Closed,
        "all" => State::All,
        _ => State::Open,
    }
}

#[async_trait]
impl ForgeApi for GitHubApi {
    async fn repository_get(&self, owner: &str, repo: &str) -> Result<RawRepo, ApiError> {
        let repository = self
            .client
            .repos(owner, repo)
            .get()
            .await
            .map_err(|e| map_error("get repository", e))?;

        Ok(convert_repo(repository, owner, repo))
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
        let issue = self
            .client
            .issues(owner, repo)
            .create(title)
            .body(body)
            .labels(labels.map(|l| l.to_vec()))
            .assignees(assignees.map(|a| a.to_vec()))
            .send()
            .await
            .map_err(|e| map_error("create issue", e))?;

        Ok(convert_issue(issue))
    }

    async fn issue_get(&self, owner: &str, repo: &str, index: u64) -> Result<RawIssue, ApiError> {
        let issue = self
            .client
            .issues(owner, repo)
            .get(index)
            .await
            .map_err(|e| map_error("get issue", e))?;

        Ok(convert_issue(issue))
    }

    async fn issue_list(
        &self,
        owner: &str,
        repo: &str,
        criteria: &ListCriteria,
    ) -> Result<Vec<RawIssue>, ApiError> {
        let handler = self.client.issues(owner, repo);
        let mut builder = handler
            .list()
            .state(list_state(&criteria.state))
            .per_page(100u8);
        if let Some(creator) = &criteria.created_by {
            builder = builder.creator(creator.clone());
        }
        if let Some(assignee) = &criteria.assigned_by {
            builder = builder.assignee(assignee.as_str());
        }
        if let Some(labels) = &criteria.labels {
            builder = builder.labels(labels);
        }

        let page = builder
            .send()
            .await
            .map_err(|e| map_error("list issues", e))?;

        Ok(page.items.into_iter().map(convert_issue).collect())
    }

    async fn issue_edit(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        edit: &IssueEdit,
    ) -> Result<RawIssue, ApiError> {
        let handler = self.client.issues(owner, repo);
        let mut builder = handler.update(index);
        if let Some(title) = &edit.title {
            builder = builder.title(title);
        }
        if let Some(body) = &edit.body {
            builder = builder.body(body);
        }
        if let Some(state) = &edit.state {
            let state = match state.as_str() {
                "closed" => IssueState::Closed,
                _ => IssueState::Open,
            };
            builder = builder.state(state);
        }
        if let Some(assignees) = &edit.assignees {
            builder = builder.assignees(assignees);
        }

        let issue = builder
            .send()
            .await
            .map_err(|e| map_error("edit issue", e))?;

        Ok(convert_issue(issue))
    }

    async fn issue_add_label(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        labels: &[String],
    ) -> Result<(), ApiError> {
        self.client
            .issues(owner, repo)
            .add_labels(index, labels)
            .await
            .map_err(|e| map_error("add labels", e))?;

        Ok(())
    }

    async fn issue_get_labels(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawLabel>, ApiError> {
        let page = self
            .client
            .issues(owner, repo)
            .list_labels_for_issue(index)
            .per_page(100u8)
            .send()
            .await
            .map_err(|e| map_error("get labels", e))?;

        Ok(page
            .items
            .into_iter()
            .map(|l| RawLabel { name: l.name })
            .collect())
    }

    async fn issue_create_comment(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let comment = self
            .client
            .issues(owner, repo)
            .create_comment(index, body)
            .await
            .map_err(|e| map_error("create comment", e))?;

        Ok(convert_comment(comment))
    }

    async fn issue_get_comments(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawComment>, ApiError> {
        let page = self
            .client
            .issues(owner, repo)
            .list_comments(index)
            .per_page(100u8)
            .send()
            .await
            .map_err(|e| map_error("get comments", e))?;

        Ok(page.items.into_iter().map(convert_comment).collect())
    }

    async fn issue_get_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<RawComment, ApiError> {
        let comment = self
            .client
            .issues(owner, repo)
            .get_comment(CommentId(id))
            .await
            .map_err(|e| map_error("get comment", e))?;

        Ok(convert_comment(comment))
    }

    async fn issue_edit_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let comment = self
            .client
            .issues(owner, repo)
            .update_comment(CommentId(id), body)
            .await
            .map_err(|e| map_error("edit comment", e))?;

        Ok(convert_comment(comment))
    }
}

/// Issue operations for GitHub projects
pub struct GitHubIssues;

/// GitHub's listing endpoint takes no type filter; pull requests are dropped afterwards
pub(crate) fn list_criteria(filter: &IssueListFilter) -> ListCriteria {
    ListCriteria {
        state: filter.status.as_str().to_string(),
        kind: None,
        created_by: filter.author.clone(),
        assigned_by: filter.assignee.clone(),
        labels: filter.labels.clone(),
    }
}

#[async_trait]
impl IssueBackend for GitHubIssues {
    async fn create_issue(
        &self,
        project: &Arc<Project>,
        new: NewIssue,
    ) -> Result<Issue, IssueError> {
        if new.private.unwrap_or(false) {
            return Err(IssueError::NotImplemented(
                "private issues are not supported by GitHub".to_string(),
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

        let raw = match project
            .api()
            .issue_get(project.namespace(), project.repo(), index)
            .await
        {
            Ok(raw) => raw,
            Err(ApiError::Gone { .. }) => {
                return Err(IssueError::IssueTrackerDisabled(project.to_string()))
            }
            Err(e) => return Err(IssueError::not_supported(format!("issue {index} not found"), e)),
        };

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
            Err(e) if rejects_filter_user(&e) => {
                warn!(project = %project, error = %e, "filter user does not exist, no issues match");
                return Ok(Vec::new());
            }
            Err(e) => return Err(IssueError::listing_failed(e)),
        };

        let total = issues.len();
        let issues: Vec<RawIssue> = issues
            .into_iter()
            .filter(|raw| raw.pull_request.is_none())
            .collect();
        debug!(total, issues = issues.len(), "dropped pull requests from listing");

        issues
            .into_iter()
            .map(|raw| Issue::from_raw(project.clone(), raw))
            .collect()
    }
}
