use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;

use crate::error::IssueError;
use crate::project::Project;
use crate::types::{CommentFilter, RawComment};

/// A comment on an issue
#[derive(Debug)]
pub struct Comment {
    project: Arc<Project>,
    parent_index: u64,
    snapshot: RawComment,
}

impl Comment {
    pub(crate) fn new(project: Arc<Project>, parent_index: u64, raw: RawComment) -> Self {
        Self {
            project,
            parent_index,
            snapshot: raw,
        }
    }

    pub fn id(&self) -> u64 {
        self.snapshot.id
    }

    pub fn body(&self) -> &str {
        &self.snapshot.body
    }

    pub fn author(&self) -> &str {
        &self.snapshot.user.login
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.snapshot.created_at
    }

    pub fn edited(&self) -> DateTime<Utc> {
        self.snapshot.updated_at
    }

    /// Index of the issue this comment was obtained through
    pub fn parent_index(&self) -> u64 {
        self.parent_index
    }

    /// Replace the comment body; the backend response becomes the new snapshot
    pub async fn set_body(&mut self, body: &str) -> Result<(), IssueError> {
        let raw = self
            .project
            .api()
            .issue_edit_comment(self.project.namespace(), self.project.repo(), self.snapshot.id, body)
            .await
            .map_err(|e| {
                IssueError::request_failed(format!("failed to edit comment {}", self.snapshot.id), e)
            })?;

        self.snapshot = raw;
        Ok(())
    }
}

/// Apply the regex filter, then the author filter, then reversal
pub(crate) fn filter_comments(
    comments: Vec<RawComment>,
    filter: &CommentFilter,
) -> Result<Vec<RawComment>, IssueError> {
    let regex = filter.filter_regex.as_deref().map(Regex::new).transpose()?;

    let mut comments: Vec<RawComment> = comments
        .into_iter()
        .filter(|c| match &regex {
            Some(re) => !c.body.is_empty() && re.is_match(&c.body),
            None => true,
        })
        .filter(|c| match &filter.author {
            Some(author) => !c.user.login.is_empty() && c.user.login == *author,
            None => true,
        })
        .collect();

    if filter.reverse {
        comments.reverse();
    }

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawUser;
    use chrono::TimeZone;

    fn raw(id: u64, body: &str, author: &str) -> RawComment {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RawComment {
            id,
            body: body.to_string(),
            user: RawUser {
                login: author.to_string(),
            },
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(comments: &[RawComment]) -> Vec<u64> {
        comments.iter().map(|c| c.id).collect()
    }

    fn sample() -> Vec<RawComment> {
        vec![
            raw(1, "foo bar", "alice"),
            raw(2, "baz", "bob"),
            raw(3, "foo2", "bob"),
            raw(4, "", "alice"),
            raw(5, "foo from nobody", ""),
        ]
    }

    #[test]
    fn test_no_filter_keeps_order() {
        let result = filter_comments(sample(), &CommentFilter::default()).unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_regex_filter() {
        let filter = CommentFilter {
            filter_regex: Some("foo".to_string()),
            ..Default::default()
        };
        let result = filter_comments(sample()[..3].to_vec(), &filter).unwrap();
        assert_eq!(ids(&result), vec![1, 3]);
    }

    #[test]
    fn test_regex_drops_empty_bodies() {
        let filter = CommentFilter {
            filter_regex: Some(".*".to_string()),
            ..Default::default()
        };
        let result = filter_comments(sample(), &filter).unwrap();
        assert_eq!(ids(&result), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_author_filter_is_exact() {
        let filter = CommentFilter {
            author: Some("bob".to_string()),
            ..Default::default()
        };
        let result = filter_comments(sample(), &filter).unwrap();
        assert_eq!(ids(&result), vec![2, 3]);

        let filter = CommentFilter {
            author: Some("bo".to_string()),
            ..Default::default()
        };
        assert!(filter_comments(sample(), &filter).unwrap().is_empty());
    }

    #[test]
    fn test_combined_filters_are_nested() {
        let all = filter_comments(sample(), &CommentFilter::default()).unwrap();
        let by_regex = filter_comments(
            sample(),
            &CommentFilter {
                filter_regex: Some("foo".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let by_both = filter_comments(
            sample(),
            &CommentFilter {
                filter_regex: Some("foo".to_string()),
                author: Some("bob".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(ids(&by_both), vec![3]);
        assert!(ids(&by_both).iter().all(|id| ids(&by_regex).contains(id)));
        assert!(ids(&by_regex).iter().all(|id| ids(&all).contains(id)));
    }

    #[test]
    fn test_reverse_applies_last() {
        let forward = CommentFilter {
            filter_regex: Some("foo".to_string()),
            ..Default::default()
        };
        let backward = CommentFilter {
            reverse: true,
            ..forward.clone()
        };

        let mut expected = ids(&filter_comments(sample(), &forward).unwrap());
        expected.reverse();
        assert_eq!(ids(&filter_comments(sample(), &backward).unwrap()), expected);
        assert_eq!(expected, vec![5, 3, 1]);
    }

    #[test]
    fn test_invalid_regex() {
        let filter = CommentFilter {
            filter_regex: Some("(unclosed".to_string()),
            ..Default::default()
        };
        let err = filter_comments(sample(), &filter).unwrap_err();
        assert!(matches!(err, IssueError::InvalidFilter(_)));
    }
}
