use thiserror::Error;

use crate::api::ApiError;

/// Error produced by a cached fetch.
///
/// Cloneable because one result is handed to every waiter of a deduplicated
/// fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid response: {0}")]
    Invalid(String),

    #[error("Query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Transient failures that a retry might fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Network(_) | QueryError::Server(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFound(_))
    }
}

impl From<ApiError> for QueryError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(body) => QueryError::NotFound(body),
            ApiError::Validation(_) | ApiError::InvalidResponse(_) => {
                QueryError::Invalid(err.to_string())
            }
            ApiError::RateLimited => QueryError::Server(err.to_string()),
            ApiError::ServerError(body) => QueryError::Server(body),
            ApiError::NetworkError(e) => QueryError::Network(e.to_string()),
            ApiError::Cancelled => QueryError::Cancelled,
        }
    }
}
