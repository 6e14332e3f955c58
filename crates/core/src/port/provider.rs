// Repository Provider Port (Interface)

use crate::domain::RepositoryContext;
use crate::error::Result;
use crate::port::Repository;
use async_trait::async_trait;
use std::sync::Arc;

/// Provisions the process-wide repository
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Validate configuration, build the pooled backend and hand it to the
    /// configured backend handler
    async fn initialize(&self, context: RepositoryContext) -> Result<()>;

    /// The cached repository; fails if `initialize` has not completed
    async fn repository(&self) -> Result<Arc<dyn Repository>>;
}
