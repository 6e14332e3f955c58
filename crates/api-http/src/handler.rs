//! Request Handlers
//!
//! Each handler turns a [`RequestContext`] into a JSON bean or an error; the
//! dispatcher owns the conversion to HTTP.

use crate::context::RequestContext;
use crate::types::{RepositoryInfo, VersionInfo};
use async_trait::async_trait;
use metarepo_core::port::RepositoryProvider;
use metarepo_core::Result;
use std::sync::Arc;
use tracing::debug;

/// API version supported by this server
pub const VERSION_V1: &str = "1";

#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_event(&self, ctx: &RequestContext) -> Result<serde_json::Value>;
}

/// Static list of supported API versions
pub struct VersionHandler {
    info: VersionInfo,
}

impl VersionHandler {
    pub fn new() -> Self {
        debug!("VersionHandler initialized");
        Self {
            info: VersionInfo {
                versions: vec![VERSION_V1.to_string()],
            },
        }
    }
}

impl Default for VersionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestHandler for VersionHandler {
    async fn handle_event(&self, _ctx: &RequestContext) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.info)?)
    }
}

/// Reports the backend and schema version of the provisioned repository
pub struct RepositoryInfoHandler {
    provider: Arc<dyn RepositoryProvider>,
}

impl RepositoryInfoHandler {
    pub fn new(provider: Arc<dyn RepositoryProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RequestHandler for RepositoryInfoHandler {
    async fn handle_event(&self, _ctx: &RequestContext) -> Result<serde_json::Value> {
        let repository = self.provider.repository().await?;

        let info = RepositoryInfo {
            backend: repository.backend().to_string(),
            schema_version: repository.schema_version().await?,
        };
        Ok(serde_json::to_value(info)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use metarepo_core::domain::RepositoryContext;
    use metarepo_core::port::Repository;
    use metarepo_core::{AppError, RepositoryError};

    struct StaticRepository;

    #[async_trait]
    impl Repository for StaticRepository {
        fn backend(&self) -> &str {
            "memory"
        }

        async fn schema_version(&self) -> Result<i64> {
            Ok(7)
        }
    }

    /// Provider that is either ready with a fixed repository or not at all
    struct StubProvider {
        repository: Option<Arc<dyn Repository>>,
    }

    #[async_trait]
    impl RepositoryProvider for StubProvider {
        async fn initialize(&self, _context: RepositoryContext) -> Result<()> {
            Ok(())
        }

        async fn repository(&self) -> Result<Arc<dyn Repository>> {
            self.repository
                .clone()
                .ok_or_else(|| RepositoryError::NotInitialized.into())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/", HeaderMap::new(), Bytes::new())
    }

    #[tokio::test]
    async fn test_version_handler() {
        let value = VersionHandler::new().handle_event(&ctx()).await.unwrap();
        assert_eq!(value, serde_json::json!({ "versions": ["1"] }));
    }

    #[tokio::test]
    async fn test_repository_info() {
        let handler = RepositoryInfoHandler::new(Arc::new(StubProvider {
            repository: Some(Arc::new(StaticRepository)),
        }));

        let value = handler.handle_event(&ctx()).await.unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "backend": "memory", "schema_version": 7 })
        );
    }

    #[tokio::test]
    async fn test_repository_info_before_initialize() {
        let handler = RepositoryInfoHandler::new(Arc::new(StubProvider { repository: None }));

        let err = handler.handle_event(&ctx()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Repository(RepositoryError::NotInitialized)
        ));
    }
}
