//! Issue handles and the mutate-then-refresh protocol.
//!
//! An [`Issue`] wraps the last full snapshot received from the backend.
//! Every successful mutation re-fetches the issue and swaps the snapshot
//! as a whole; a failed mutation leaves the previous snapshot in place.
//!
//! Labels are not served from the snapshot: [`Issue::labels`] asks the
//! backend on every call. Assignees are always read from the snapshot.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::comment::{self, Comment};
use crate::error::IssueError;
use crate::project::Project;
use crate::types::{AssigneeRef, CommentFilter, IssueEdit, IssueStatus, Label, RawIssue};

#[derive(Debug)]
pub struct Issue {
    project: Arc<Project>,
    index: u64,
    snapshot: RawIssue,
    status: IssueStatus,
}

impl Issue {
    /// Wrap a raw issue; fails if the backend state is not a known status
    pub fn from_raw(project: Arc<Project>, raw: RawIssue) -> Result<Self, IssueError> {
        let status = IssueStatus::from_state(&raw.state)?;
        Ok(Self {
            project,
            index: raw.number,
            snapshot: raw,
            status,
        })
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// Per-project number used to address the issue
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Global identifier; informational only
    pub fn id(&self) -> u64 {
        self.snapshot.id
    }

    pub fn title(&self) -> &str {
        &self.snapshot.title
    }

    pub fn description(&self) -> &str {
        &self.snapshot.body
    }

    pub fn author(&self) -> &str {
        &self.snapshot.user.login
    }

    pub fn url(&self) -> &str {
        &self.snapshot.url
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.snapshot.created_at
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    /// Assignees as of the last snapshot
    pub fn assignees(&self) -> Vec<AssigneeRef> {
        self.snapshot.assignees.clone().unwrap_or_default()
    }

    pub fn raw(&self) -> &RawIssue {
        &self.snapshot
    }

    /// Labels currently on the issue, fetched from the backend
    pub async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        let labels = self
            .project
            .api()
            .issue_get_labels(self.project.namespace(), self.project.repo(), self.index)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to get labels of issue #{}", self.index), e)
            })?;

        Ok(labels
            .into_iter()
            .map(|l| Label {
                name: l.name,
                issue_index: self.index,
            })
            .collect())
    }

    /// Re-fetch the issue and replace the snapshot
    pub async fn refresh(&mut self) -> Result<(), IssueError> {
        debug!(index = self.index, project = %self.project, "refreshing issue");
        let raw = self
            .project
            .api()
            .issue_get(self.project.namespace(), self.project.repo(), self.index)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to refresh issue #{}", self.index), e)
            })?;

        let status = IssueStatus::from_state(&raw.state)?;
        self.snapshot = raw;
        self.status = status;
        Ok(())
    }

    pub async fn set_title(&mut self, title: &str) -> Result<(), IssueError> {
        let edit = IssueEdit {
            title: Some(title.to_string()),
            ..Default::default()
        };
        self.edit(&edit).await
    }

    pub async fn set_description(&mut self, description: &str) -> Result<(), IssueError> {
        let edit = IssueEdit {
            body: Some(description.to_string()),
            ..Default::default()
        };
        self.edit(&edit).await
    }

    /// Close the issue; the returned handle already reflects the closed state
    pub async fn close(&mut self) -> Result<&Self, IssueError> {
        let edit = IssueEdit {
            state: Some(IssueStatus::Closed.as_str().to_string()),
            ..Default::default()
        };
        self.edit(&edit).await?;
        Ok(self)
    }

    /// Add assignees, keeping the existing ones
    ///
    /// The backend replaces the assignee set on edit, so the full union is sent.
    pub async fn add_assignee<I, A>(&mut self, assignees: I) -> Result<(), IssueError>
    where
        I: IntoIterator<Item = A>,
        A: Into<AssigneeRef>,
    {
        let mut logins: Vec<String> = self.assignees().into_iter().map(|a| a.login).collect();
        for assignee in assignees {
            let login = assignee.into().login;
            if !logins.contains(&login) {
                logins.push(login);
            }
        }

        let edit = IssueEdit {
            assignees: Some(logins),
            ..Default::default()
        };
        self.edit(&edit).await
    }

    /// Attach labels by name
    pub async fn add_label<I, S>(&mut self, labels: I) -> Result<(), IssueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        debug!(index = self.index, ?labels, "adding labels");

        self.project
            .api()
            .issue_add_label(self.project.namespace(), self.project.repo(), self.index, &labels)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to label issue #{}", self.index), e)
            })?;

        self.refresh().await
    }

    /// Post a new comment on the issue
    pub async fn comment(&self, body: &str) -> Result<Comment, IssueError> {
        let raw = self
            .project
            .api()
            .issue_create_comment(self.project.namespace(), self.project.repo(), self.index, body)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to comment on issue #{}", self.index), e)
            })?;

        Ok(Comment::new(self.project.clone(), self.index, raw))
    }

    /// Comments of the issue in backend order, filtered client-side
    pub async fn get_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>, IssueError> {
        let raw = self
            .project
            .api()
            .issue_get_comments(self.project.namespace(), self.project.repo(), self.index)
            .await
            .map_err(|e| {
                IssueError::request_failed(
                    format!("failed to get comments of issue #{}", self.index),
                    e,
                )
            })?;

        Ok(comment::filter_comments(raw, &filter)?
            .into_iter()
            .map(|c| Comment::new(self.project.clone(), self.index, c))
            .collect())
    }

    /// Get a single comment by id
    ///
    /// The lookup is scoped by repository only; the comment is attached to
    /// this issue whatever issue it belongs to on the backend.
    pub async fn get_comment(&self, id: u64) -> Result<Comment, IssueError> {
        let raw = self
            .project
            .api()
            .issue_get_comment(self.project.namespace(), self.project.repo(), id)
            .await
            .map_err(|e| IssueError::request_failed(format!("failed to get comment {id}"), e))?;

        Ok(Comment::new(self.project.clone(), self.index, raw))
    }

    /// Send an edit, then replace the snapshot with a fresh fetch
    async fn edit(&mut self, edit: &IssueEdit) -> Result<(), IssueError> {
        debug!(index = self.index, ?edit, "editing issue");
        self.project
            .api()
            .issue_edit(self.project.namespace(), self.project.repo(), self.index, edit)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to edit issue #{}", self.index), e)
            })?;

        self.refresh().await
    }
}
