// Central Error Types for the Application

use thiserror::Error;

/// Boxed error used to carry an underlying cause across crate boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable, externally visible error code (sent in response headers)
pub trait ErrorCode {
    /// Machine readable code, e.g. `REPO_0002`
    fn code(&self) -> &'static str;
}

/// Generic code used when an error is not a recognized domain error
pub const GENERIC_ERROR_CODE: &str = "CORE_0000";

/// Failures of repository provisioning
///
/// All kinds are raised synchronously from provider initialization and are
/// fatal to startup, except `PoolExhausted` which surfaces on borrow.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Invalid backend handler specified: {identifier}")]
    HandlerNotFound {
        identifier: String,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Invalid connection URL specified")]
    MissingConnectionUrl,

    #[error("Invalid or missing database driver: {}", driver.as_deref().unwrap_or("<unset>"))]
    MissingOrUnresolvableDriver { driver: Option<String> },

    #[error("Backend handler identifier is not configured")]
    MissingHandlerIdentifier,

    #[error("Backend handler {identifier} failed to initialize")]
    HandlerInitializationFailed {
        identifier: String,
        #[source]
        cause: BoxError,
    },

    #[error("Unable to construct connection pool: {reason}")]
    PoolConstructionFailed { reason: String },

    #[error("Connection pool exhausted: no connection available within {timeout_ms}ms")]
    PoolExhausted { timeout_ms: u64 },

    #[error("Repository provider has not been initialized")]
    NotInitialized,

    #[error("Database error: {0}")]
    Database(String),
}

impl ErrorCode for RepositoryError {
    fn code(&self) -> &'static str {
        match self {
            RepositoryError::HandlerNotFound { .. } => "REPO_0001",
            RepositoryError::MissingConnectionUrl => "REPO_0002",
            RepositoryError::MissingOrUnresolvableDriver { .. } => "REPO_0003",
            RepositoryError::MissingHandlerIdentifier => "REPO_0004",
            RepositoryError::HandlerInitializationFailed { .. } => "REPO_0005",
            RepositoryError::PoolConstructionFailed { .. } => "REPO_0006",
            RepositoryError::PoolExhausted { .. } => "REPO_0007",
            RepositoryError::NotInitialized => "REPO_0008",
            RepositoryError::Database(_) => "REPO_0009",
        }
    }
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorCode for AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Repository(e) => e.code(),
            AppError::Config(_) => "CORE_0001",
            AppError::Serialization(_) => "CORE_0002",
            AppError::Internal(_) => GENERIC_ERROR_CODE,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
