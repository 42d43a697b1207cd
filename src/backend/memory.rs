//! In-process forge with Forgejo semantics.
//!
//! Useful for tests and offline experiments: repositories, users, issues,
//! labels and comments live in a `HashMap` behind a mutex. Error signaling
//! follows Forgejo (404 with `user does not exist` for unknown filter users,
//! pull requests served by the issues listing unless `type=issues`).
//!
//! Timestamps come from a logical clock that advances one second per write,
//! so "edited after" comparisons are deterministic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::ForgeApi;
use crate::error::ApiError;
use crate::types::{
    AssigneeRef, IssueEdit, ListCriteria, RawComment, RawIssue, RawLabel, RawPullRequestRef,
    RawRepo, RawUser,
};

#[derive(Default)]
struct RepoState {
    has_issues: bool,
    issues: Vec<RawIssue>,
    labels: HashMap<u64, Vec<String>>,
    /// Comments with the index of the issue they belong to
    comments: Vec<(u64, RawComment)>,
}

struct ForgeState {
    acting_user: String,
    users: HashSet<String>,
    repos: HashMap<(String, String), RepoState>,
    next_id: u64,
    clock: DateTime<Utc>,
    requests: usize,
    fail_next: Option<ApiError>,
}

impl ForgeState {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn repo(&mut self, owner: &str, repo: &str) -> Result<&mut RepoState, ApiError> {
        self.repos
            .get_mut(&(owner.to_string(), repo.to_string()))
            .ok_or_else(|| ApiError::NotFound {
                message: format!("repository does not exist [owner: {owner}, name: {repo}]"),
            })
    }

    fn check_user(&self, login: &str) -> Result<(), ApiError> {
        if self.users.contains(login) {
            Ok(())
        } else {
            Err(ApiError::NotFound {
                message: format!("user does not exist [uid: 0, name: {login}]"),
            })
        }
    }
}

impl RepoState {
    fn issue_mut(&mut self, index: u64) -> Result<&mut RawIssue, ApiError> {
        self.issues
            .iter_mut()
            .find(|i| i.number == index)
            .ok_or_else(|| ApiError::NotFound {
                message: format!("issue does not exist [index: {index}]"),
            })
    }

    fn comment_mut(&mut self, id: u64) -> Result<&mut RawComment, ApiError> {
        self.comments
            .iter_mut()
            .map(|(_, c)| c)
            .find(|c| c.id == id)
            .ok_or_else(|| ApiError::NotFound {
                message: format!("comment does not exist [id: {id}]"),
            })
    }
}

/// Forge held entirely in memory
pub struct InMemoryForge {
    state: Mutex<ForgeState>,
}

impl InMemoryForge {
    /// Create an empty forge; writes are attributed to `acting_user`
    pub fn new(acting_user: &str) -> Self {
        let mut users = HashSet::new();
        users.insert(acting_user.to_string());

        Self {
            state: Mutex::new(ForgeState {
                acting_user: acting_user.to_string(),
                users,
                repos: HashMap::new(),
                next_id: 1000,
                clock: Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default(),
                requests: 0,
                fail_next: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ForgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the state for an API call, counting it and honoring an injected failure
    fn request(&self) -> Result<MutexGuard<'_, ForgeState>, ApiError> {
        let mut state = self.lock();
        state.requests += 1;
        let failure = state.fail_next.take();
        match failure {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    pub fn add_user(&self, login: &str) {
        self.lock().users.insert(login.to_string());
    }

    pub fn add_repo(&self, owner: &str, repo: &str, has_issues: bool) {
        let mut state = self.lock();
        state.users.insert(owner.to_string());
        state.repos.insert(
            (owner.to_string(), repo.to_string()),
            RepoState {
                has_issues,
                ..Default::default()
            },
        );
    }

    /// Add an issue authored by `author`, returning its index
    ///
    /// # Panics
    ///
    /// Panics if the repository was never added.
    pub fn seed_issue(&self, owner: &str, repo: &str, author: &str, title: &str, body: &str) -> u64 {
        self.seed_entry(owner, repo, author, title, body, None)
    }

    /// Add a pull request, which shares the issue index space
    pub fn seed_pull_request(&self, owner: &str, repo: &str, author: &str, title: &str) -> u64 {
        self.seed_entry(owner, repo, author, title, "", Some(RawPullRequestRef::default()))
    }

    /// Add a comment by `author` to an issue, returning the comment id
    ///
    /// # Panics
    ///
    /// Panics if the repository or the issue does not exist.
    pub fn seed_comment(&self, owner: &str, repo: &str, index: u64, author: &str, body: &str) -> u64 {
        let mut state = self.lock();
        state.users.insert(author.to_string());
        let id = state.next_id();
        let at = state.tick();
        let repo_state = seeded_repo(&mut state, owner, repo);
        if let Err(e) = repo_state.issue_mut(index) {
            panic!("cannot seed comment into {owner}/{repo}: {e}");
        }

        repo_state.comments.push((
            index,
            RawComment {
                id,
                body: body.to_string(),
                user: RawUser {
                    login: author.to_string(),
                },
                created_at: at,
                updated_at: at,
            },
        ));
        id
    }

    /// Make the next API call fail with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.lock().fail_next = Some(error);
    }

    /// Number of API calls received so far
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    fn seed_entry(
        &self,
        owner: &str,
        repo: &str,
        author: &str,
        title: &str,
        body: &str,
        pull_request: Option<RawPullRequestRef>,
    ) -> u64 {
        let mut state = self.lock();
        state.users.insert(author.to_string());
        let id = state.next_id();
        let at = state.tick();
        let repo_state = seeded_repo(&mut state, owner, repo);

        let index = repo_state.issues.len() as u64 + 1;
        repo_state.issues.push(RawIssue {
            number: index,
            id,
            title: title.to_string(),
            body: body.to_string(),
            url: format!("memory://{owner}/{repo}/issues/{index}"),
            user: RawUser {
                login: author.to_string(),
            },
            created_at: at,
            state: "open".to_string(),
            assignees: None,
            pull_request,
        });
        index
    }
}

/// Repository targeted by a seed helper; seeding a missing one is a setup mistake
fn seeded_repo<'a>(state: &'a mut ForgeState, owner: &str, repo: &str) -> &'a mut RepoState {
    match state.repo(owner, repo) {
        Ok(repo_state) => repo_state,
        Err(e) => panic!("cannot seed {owner}/{repo}: {e}"),
    }
}

fn is_assigned(issue: &RawIssue, login: &str) -> bool {
    issue
        .assignees
        .as_ref()
        .is_some_and(|a| a.iter().any(|a| a.login == login))
}

#[async_trait]
impl ForgeApi for InMemoryForge {
    async fn repository_get(&self, owner: &str, repo: &str) -> Result<RawRepo, ApiError> {
        let mut state = self.request()?;
        let repo_state = state.repo(owner, repo)?;
        Ok(RawRepo {
            full_name: format!("{owner}/{repo}"),
            has_issues: repo_state.has_issues,
        })
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
        let mut state = self.request()?;
        for login in assignees.unwrap_or_default() {
            state.check_user(login)?;
        }
        let author = state.acting_user.clone();
        let id = state.next_id();
        let at = state.tick();
        let repo_state = state.repo(owner, repo)?;

        let index = repo_state.issues.len() as u64 + 1;
        let issue = RawIssue {
            number: index,
            id,
            title: title.to_string(),
            body: body.to_string(),
            url: format!("memory://{owner}/{repo}/issues/{index}"),
            user: RawUser { login: author },
            created_at: at,
            state: "open".to_string(),
            assignees: assignees
                .filter(|a| !a.is_empty())
                .map(|a| a.iter().map(|l| AssigneeRef::from(l.as_str())).collect()),
            pull_request: None,
        };
        repo_state.issues.push(issue.clone());
        if let Some(labels) = labels {
            repo_state.labels.insert(index, labels.to_vec());
        }
        Ok(issue)
    }

    async fn issue_get(&self, owner: &str, repo: &str, index: u64) -> Result<RawIssue, ApiError> {
        let mut state = self.request()?;
        let issue = state.repo(owner, repo)?.issue_mut(index)?;
        Ok(issue.clone())
    }

    async fn issue_list(
        &self,
        owner: &str,
        repo: &str,
        criteria: &ListCriteria,
    ) -> Result<Vec<RawIssue>, ApiError> {
        let mut state = self.request()?;
        if let Some(login) = &criteria.created_by {
            state.check_user(login)?;
        }
        if let Some(login) = &criteria.assigned_by {
            state.check_user(login)?;
        }
        let repo_state = state.repo(owner, repo)?;

        let issues = repo_state
            .issues
            .iter()
            .filter(|i| criteria.state == "all" || i.state == criteria.state)
            .filter(|i| match criteria.kind.as_deref() {
                Some("issues") => i.pull_request.is_none(),
                Some("pulls") => i.pull_request.is_some(),
                _ => true,
            })
            .filter(|i| {
                criteria
                    .created_by
                    .as_ref()
                    .map_or(true, |login| i.user.login == *login)
            })
            .filter(|i| {
                criteria
                    .assigned_by
                    .as_ref()
                    .map_or(true, |login| is_assigned(i, login))
            })
            .filter(|i| {
                criteria.labels.as_ref().map_or(true, |wanted| {
                    let present = repo_state.labels.get(&i.number);
                    wanted
                        .iter()
                        .all(|w| present.is_some_and(|p| p.contains(w)))
                })
            })
            .cloned()
            .collect();
        Ok(issues)
    }

    async fn issue_edit(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        edit: &IssueEdit,
    ) -> Result<RawIssue, ApiError> {
        let mut state = self.request()?;
        for login in edit.assignees.iter().flatten() {
            state.check_user(login)?;
        }
        if let Some(s) = &edit.state {
            if s != "open" && s != "closed" {
                return Err(ApiError::Unprocessable {
                    message: format!("invalid state '{s}'"),
                });
            }
        }
        let issue = state.repo(owner, repo)?.issue_mut(index)?;

        if let Some(title) = &edit.title {
            issue.title = title.clone();
        }
        if let Some(body) = &edit.body {
            issue.body = body.clone();
        }
        if let Some(s) = &edit.state {
            issue.state = s.clone();
        }
        if let Some(assignees) = &edit.assignees {
            issue.assignees = Some(
                assignees
                    .iter()
                    .map(|l| AssigneeRef::from(l.as_str()))
                    .collect(),
            );
        }
        Ok(issue.clone())
    }

    async fn issue_add_label(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        labels: &[String],
    ) -> Result<(), ApiError> {
        let mut state = self.request()?;
        let repo_state = state.repo(owner, repo)?;
        repo_state.issue_mut(index)?;

        let current = repo_state.labels.entry(index).or_default();
        for label in labels {
            if !current.contains(label) {
                current.push(label.clone());
            }
        }
        Ok(())
    }

    async fn issue_get_labels(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawLabel>, ApiError> {
        let mut state = self.request()?;
        let repo_state = state.repo(owner, repo)?;
        repo_state.issue_mut(index)?;

        Ok(repo_state
            .labels
            .get(&index)
            .map(|names| {
                names
                    .iter()
                    .map(|name| RawLabel { name: name.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn issue_create_comment(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let mut state = self.request()?;
        let author = state.acting_user.clone();
        let id = state.next_id();
        let at = state.tick();
        let repo_state = state.repo(owner, repo)?;
        repo_state.issue_mut(index)?;

        let comment = RawComment {
            id,
            body: body.to_string(),
            user: RawUser { login: author },
            created_at: at,
            updated_at: at,
        };
        repo_state.comments.push((index, comment.clone()));
        Ok(comment)
    }

    async fn issue_get_comments(
        &self,
        owner: &str,
        repo: &str,
        index: u64,
    ) -> Result<Vec<RawComment>, ApiError> {
        let mut state = self.request()?;
        let repo_state = state.repo(owner, repo)?;
        repo_state.issue_mut(index)?;

        Ok(repo_state
            .comments
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn issue_get_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
    ) -> Result<RawComment, ApiError> {
        let mut state = self.request()?;
        let comment = state.repo(owner, repo)?.comment_mut(id)?;
        Ok(comment.clone())
    }

    async fn issue_edit_comment(
        &self,
        owner: &str,
        repo: &str,
        id: u64,
        body: &str,
    ) -> Result<RawComment, ApiError> {
        let mut state = self.request()?;
        let at = state.tick();
        let comment = state.repo(owner, repo)?.comment_mut(id)?;
        comment.body = body.to_string();
        comment.updated_at = at;
        Ok(comment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_honors_type_discriminator() {
        let forge = InMemoryForge::new("alice");
        forge.add_repo("alice", "demo", true);
        forge.seed_issue("alice", "demo", "alice", "bug", "");
        forge.seed_pull_request("alice", "demo", "alice", "fix");

        let all = ListCriteria {
            state: "open".to_string(),
            ..Default::default()
        };
        assert_eq!(forge.issue_list("alice", "demo", &all).await.unwrap().len(), 2);

        let issues_only = ListCriteria {
            kind: Some("issues".to_string()),
            ..all
        };
        let listed = forge.issue_list("alice", "demo", &issues_only).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "bug");
    }

    #[tokio::test]
    async fn test_unknown_filter_user() {
        let forge = InMemoryForge::new("alice");
        forge.add_repo("alice", "demo", true);

        let criteria = ListCriteria {
            state: "open".to_string(),
            created_by: Some("ghost".to_string()),
            ..Default::default()
        };
        let err = forge.issue_list("alice", "demo", &criteria).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains("user does not exist"));
    }

    #[test]
    #[should_panic(expected = "cannot seed alice/typo")]
    fn test_seeding_missing_repo_panics() {
        let forge = InMemoryForge::new("alice");
        forge.add_repo("alice", "demo", true);
        forge.seed_issue("alice", "typo", "alice", "bug", "");
    }

    #[test]
    #[should_panic(expected = "issue does not exist")]
    fn test_seeding_comment_on_missing_issue_panics() {
        let forge = InMemoryForge::new("alice");
        forge.add_repo("alice", "demo", true);
        forge.seed_comment("alice", "demo", 7, "alice", "orphan");
    }

    #[test]
    fn test_is_assigned() {
        let mut issue = RawIssue {
            number: 1,
            id: 1,
            title: String::new(),
            body: String::new(),
            url: String::new(),
            user: RawUser {
                login: "alice".to_string(),
            },
            created_at: Utc::now(),
            state: "open".to_string(),
            assignees: None,
            pull_request: None,
        };
        assert!(!is_assigned(&issue, "bob"));

        issue.assignees = Some(vec![AssigneeRef::from("bob")]);
        assert!(is_assigned(&issue, "bob"));
        assert!(!is_assigned(&issue, "alice"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let forge = InMemoryForge::new("alice");
        forge.add_repo("alice", "demo", true);
        forge.fail_next(ApiError::Transport("connection reset".to_string()));

        assert!(forge.repository_get("alice", "demo").await.is_err());
        assert!(forge.repository_get("alice", "demo").await.is_ok());
        assert_eq!(forge.request_count(), 2);
    }
}
