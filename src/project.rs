use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::backend::forgejo::ForgejoApi;
use crate::backend::github::GitHubApi;
use crate::backend::memory::InMemoryForge;
use crate::backend::{ForgeApi, IssueBackend, ServiceKind};
use crate::error::{ApiError, IssueError};
use crate::issue::Issue;
use crate::types::{IssueListFilter, NewIssue, RawRepo};

/// Host name used for projects backed by the in-memory forge
pub const IN_MEMORY_HOST: &str = "memory";

/// A hosting service instance projects are looked up on
pub struct Service {
    kind: ServiceKind,
    instance_url: String,
    api: Arc<dyn ForgeApi>,
}

impl Service {
    pub fn new(kind: ServiceKind, instance_url: impl Into<String>, api: Arc<dyn ForgeApi>) -> Self {
        Self {
            kind,
            instance_url: instance_url.into(),
            api,
        }
    }

    /// Connect to a Forgejo (or Gitea) instance
    pub fn forgejo(instance_url: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let api = ForgejoApi::new(instance_url, token)?;
        Ok(Self::new(ServiceKind::Forgejo, instance_url, Arc::new(api)))
    }

    /// Connect to GitHub with a personal access token
    pub fn github(token: &str) -> Result<Self, ApiError> {
        let api = GitHubApi::new(token)?;
        Ok(Self::new(ServiceKind::GitHub, "https://github.com", Arc::new(api)))
    }

    /// Service backed by an in-process forge with Forgejo semantics
    pub fn in_memory(forge: Arc<InMemoryForge>) -> Self {
        Self::new(ServiceKind::Forgejo, IN_MEMORY_HOST, forge)
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// Get a handle on a project; nothing is fetched until it is used
    pub fn project(&self, namespace: &str, repo: &str) -> Arc<Project> {
        Project::new(
            self.instance_url.clone(),
            namespace,
            repo,
            self.api.clone(),
            self.kind.issue_backend(),
        )
    }
}

/// A repository on a hosting service, bound to one issue implementation
pub struct Project {
    host: String,
    namespace: String,
    repo: String,
    api: Arc<dyn ForgeApi>,
    issues: Arc<dyn IssueBackend>,
    repository: OnceCell<RawRepo>,
}

impl Project {
    pub fn new(
        host: impl Into<String>,
        namespace: impl Into<String>,
        repo: impl Into<String>,
        api: Arc<dyn ForgeApi>,
        issues: Arc<dyn IssueBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            host: host.into(),
            namespace: namespace.into(),
            repo: repo.into(),
            api,
            issues,
            repository: OnceCell::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub(crate) fn api(&self) -> &dyn ForgeApi {
        self.api.as_ref()
    }

    /// Whether the issue tracker is enabled; fetched once and cached for the
    /// lifetime of this handle
    pub async fn issues_enabled(&self) -> Result<bool, IssueError> {
        let repository = self
            .repository
            .get_or_try_init(|| async {
                debug!(project = %self, "fetching repository");
                self.api
                    .repository_get(&self.namespace, &self.repo)
                    .await
                    .map_err(|e| {
                        IssueError::request_failed(format!("failed to fetch repository {}", self), e)
                    })
            })
            .await?;

        Ok(repository.has_issues)
    }

    /// Fail with `IssueTrackerDisabled` unless the tracker is enabled
    pub(crate) async fn ensure_issues_enabled(&self) -> Result<(), IssueError> {
        if self.issues_enabled().await? {
            Ok(())
        } else {
            Err(IssueError::IssueTrackerDisabled(self.to_string()))
        }
    }

    pub async fn create_issue(self: &Arc<Self>, new: NewIssue) -> Result<Issue, IssueError> {
        self.issues.create_issue(self, new).await
    }

    pub async fn get_issue(self: &Arc<Self>, index: u64) -> Result<Issue, IssueError> {
        self.issues.get_issue(self, index).await
    }

    pub async fn get_issue_list(
        self: &Arc<Self>,
        filter: IssueListFilter,
    ) -> Result<Vec<Issue>, IssueError> {
        self.issues.list_issues(self, filter).await
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.namespace, self.repo)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("host", &self.host)
            .field("namespace", &self.namespace)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
