use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{ApiError, IssueError};
use crate::issue::Issue;
use crate::project::Project;
use crate::types::{
    IssueEdit, IssueListFilter, ListCriteria, NewIssue, RawComment, RawIssue, RawLabel, RawRepo,
};

pub mod forgejo;
pub mod github;
pub mod memory;

/// Network API of one git hosting service.
///
/// `owner`/`repo` are always the namespace and repository name of the
/// project the call is made for.
#[async_trait]
pub trait ForgeApi: Send + Sync {
    /// Fetch repository metadata
    async fn repository_get(&self, owner: &str, repo: &str) -> Result<RawRepo, ApiError>;

    /// Create a new issue
    async fn issue_create(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        labels: Option<&[String]>,
        assignees: Option<&[String]>,
    ) -> Result<RawIssue, ApiError>;

    /// Get an issue by its per-project index
    async fn issue_get(&self, owner: &str, repo: &str, index: u64) -> Result<RawIssue, ApiError>;

    /// List issues matching the criteria
    async fn issue_list(
        &self,
        owner: &str,
        repo: &str,
        criteria: &ListCriteria,
    ) -> Result<Vec<RawIssue>, ApiError>;

    /// Edit the fields set in `edit`
    async fn issue_edit(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        edit: &IssueEdit,
    ) -> Result<RawIssue, ApiError>;

    /// Attach labels to an issue
    async fn issue_add_label(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        labels: &[String],
    ) -> Result<(), ApiError>;

    async fn issue_get_labels(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawLabel>, ApiError>;

    async fn issue_create_comment(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        body: &str,
    ) -> Result<RawComment, ApiError>;

    async fn issue_get_comments(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawComment>, ApiError>;

    /// Get a comment by id; comments are addressed per repository, not per issue
    async fn issue_get_comment(&self, owner: &str, repo: &str, id: u64)
        -> Result<RawComment, ApiError>;

    async fn issue_edit_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<RawComment, ApiError>;
}

/// Issue factory operations, implemented once per backend
#[async_trait]
pub trait IssueBackend: Send + Sync {
    /// Create a new issue in the project
    async fn create_issue(&self, project: &Arc<Project>, new: NewIssue)
        -> Result<Issue, IssueError>;

    /// Get an issue by index
    async fn get_issue(&self, project: &Arc<Project>, index: u64) -> Result<Issue, IssueError>;

    /// List issues of the project
    async fn list_issues(
        &self,
        project: &Arc<Project>,
        filter: IssueListFilter,
    ) -> Result<Vec<Issue>, IssueError>;
}

/// Hosting service families a project can be backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Forgejo,
    #[serde(rename = "github")]
    GitHub,
}

impl ServiceKind {
    /// Issue implementation used for projects on this kind of service
    pub fn issue_backend(&self) -> Arc<dyn IssueBackend> {
        match self {
            ServiceKind::Forgejo => Arc::new(forgejo::ForgejoIssues),
            ServiceKind::GitHub => Arc::new(github::GitHubIssues),
        }
    }

    /// Environment variable the access token is read from by default
    pub fn token_env(&self) -> &'static str {
        match self {
            ServiceKind::Forgejo => "FORGEJO_TOKEN",
            ServiceKind::GitHub => "GITHUB_TOKEN",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Forgejo => f.write_str("forgejo"),
            ServiceKind::GitHub => f.write_str("github"),
        }
    }
}
