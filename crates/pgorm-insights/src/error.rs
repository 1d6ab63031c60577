//! Error types for pgorm-insights

use thiserror::Error;

/// Result type alias for pgorm-insights operations
pub type InsightsResult<T> = Result<T, InsightsError>;

/// Error types for intercepted execution, registration and configuration.
///
/// None of these ever escape an interceptor callback: the monitor turns them
/// into trace events and lets the host command proceed.
#[derive(Debug, Error)]
pub enum InsightsError {
    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The interceptor registry could not be updated
    #[error("Registration error: {0}")]
    Registration(String),

    /// The interceptor is already present in the registry
    #[error("Interceptor is already registered")]
    AlreadyRegistered,

    /// The interceptor is not present in the registry
    #[error("Interceptor is not registered")]
    NotRegistered,

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl InsightsError {
    /// Create a registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this error came from the interceptor registry
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::Registration(_) | Self::AlreadyRegistered | Self::NotRegistered
        )
    }
}
