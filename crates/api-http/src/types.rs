//! Response Beans
//!
//! JSON bodies produced by the built-in handlers and the error path.

use serde::{Deserialize, Serialize};

/// GET /version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub versions: Vec<String>,
}

/// GET /v1/repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub backend: String,
    pub schema_version: i64,
}

/// Body of every failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub error_code: String,
    pub message: String,
    /// Error followed by its chain of causes, outermost first
    pub stack_trace: Vec<String>,
}
