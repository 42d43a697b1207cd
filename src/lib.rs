pub mod backend;
pub mod comment;
pub mod config;
pub mod error;
pub mod issue;
pub mod project;
pub mod types;

// Re-export commonly used types
pub use backend::memory::InMemoryForge;
pub use backend::{ForgeApi, IssueBackend, ServiceKind};
pub use comment::Comment;
pub use error::{ApiError, IssueError};
pub use issue::Issue;
pub use project::{Project, Service};
pub use types::{AssigneeRef, CommentFilter, IssueListFilter, IssueStatus, Label, NewIssue};
