use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IssueError;

/// Status of an issue on the remote tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueStatus {
    #[default]
    Open,
    Closed,
    /// Only meaningful as a listing filter
    All,
}

/// Backend state strings an issue snapshot may carry
const STATE_TABLE: &[(&str, IssueStatus)] = &[
    ("open", IssueStatus::Open),
    ("closed", IssueStatus::Closed),
];

impl IssueStatus {
    /// Map a raw backend state string to a status, rejecting anything outside the table
    pub fn from_state(state: &str) -> Result<Self, IssueError> {
        STATE_TABLE
            .iter()
            .find(|(raw, _)| *raw == state)
            .map(|(_, status)| *status)
            .ok_or_else(|| IssueError::UnknownStatus(state.to_string()))
    }

    /// Literal token used by the backends for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Closed => "closed",
            IssueStatus::All => "all",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = IssueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(IssueStatus::All),
            other => IssueStatus::from_state(other),
        }
    }
}

/// A label attached to an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    /// Index of the issue the label was read from
    pub issue_index: u64,
}

/// Normalized assignee reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssigneeRef {
    pub login: String,
}

impl From<&str> for AssigneeRef {
    fn from(login: &str) -> Self {
        Self { login: login.to_string() }
    }
}

impl From<String> for AssigneeRef {
    fn from(login: String) -> Self {
        Self { login }
    }
}

impl From<&AssigneeRef> for AssigneeRef {
    fn from(r: &AssigneeRef) -> Self {
        r.clone()
    }
}

/// Repository as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRepo {
    pub full_name: String,
    #[serde(default = "default_true")]
    pub has_issues: bool,
}

fn default_true() -> bool {
    true
}

/// User reference embedded in issues and comments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub login: String,
}

/// Marker present on listing entries that are pull requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPullRequestRef {
    #[serde(default)]
    pub merged: bool,
}

/// Full issue representation as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssue {
    pub number: u64,
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user: RawUser,
    pub created_at: DateTime<Utc>,
    pub state: String,
    #[serde(default)]
    pub assignees: Option<Vec<AssigneeRef>>,
    #[serde(default)]
    pub pull_request: Option<RawPullRequestRef>,
}

/// Comment representation as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: RawUser,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Label representation as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLabel {
    pub name: String,
}

/// Parameters for creating an issue
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub private: Option<bool>,
    pub labels: Option<Vec<String>>,
    pub assignees: Option<Vec<String>>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }
}

/// Parameters for listing issues of a project
#[derive(Debug, Clone, Default)]
pub struct IssueListFilter {
    pub status: IssueStatus,
    pub author: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// Criteria sent to the backend listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCriteria {
    pub state: String,
    /// Restricts the listing to one kind of entry (e.g. "issues")
    pub kind: Option<String>,
    pub created_by: Option<String>,
    pub assigned_by: Option<String>,
    pub labels: Option<Vec<String>>,
}

/// Fields changed by a backend edit call; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<String>>,
}

/// Client-side filters applied to an issue's comments
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub filter_regex: Option<String>,
    pub author: Option<String>,
    pub reverse: bool,
}
