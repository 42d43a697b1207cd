use thiserror::Error;

/// Failure reported by a backend adapter, in a vocabulary shared by all backends
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The resource exists but has been switched off (HTTP 410)
    #[error("gone: {message}")]
    Gone { message: String },

    /// The request was understood but rejected (HTTP 422)
    #[error("unprocessable: {message}")]
    Unprocessable { message: String },

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build an error from an HTTP status code and the backend's message
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => ApiError::NotFound { message },
            410 => ApiError::Gone { message },
            422 => ApiError::Unprocessable { message },
            _ => ApiError::Status { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Message carried by the backend, if any
    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound { message }
            | ApiError::Gone { message }
            | ApiError::Unprocessable { message }
            | ApiError::Status { message, .. } => message,
            ApiError::Transport(message) | ApiError::Decode(message) => message,
        }
    }
}

/// Error kinds surfaced to callers of projects, issues and comments
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("issue tracker is disabled for {0}")]
    IssueTrackerDisabled(String),

    #[error("operation not supported: {message}")]
    OperationNotSupported {
        message: String,
        #[source]
        source: Option<ApiError>,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("unknown issue state '{0}'")]
    UnknownStatus(String),

    #[error("invalid comment filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("{context}")]
    RequestFailed {
        context: String,
        #[source]
        source: ApiError,
    },
}

impl IssueError {
    pub fn not_supported(message: impl Into<String>, source: ApiError) -> Self {
        IssueError::OperationNotSupported {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Listing failures are reported as unsupported operations carrying the cause
    pub fn listing_failed(source: ApiError) -> Self {
        IssueError::not_supported("failed to list issues", source)
    }

    pub fn request_failed(context: impl Into<String>, source: ApiError) -> Self {
        IssueError::RequestFailed {
            context: context.into(),
            source,
        }
    }
}
