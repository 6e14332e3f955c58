// Repository Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// Opaque persistence facade produced by a backend handler
///
/// The provider never interprets it; it only caches and hands out the single
/// instance built by the handler.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Backend name (e.g. `sqlite`)
    fn backend(&self) -> &str;

    /// Version of the schema installed by the backend handler
    async fn schema_version(&self) -> Result<i64>;
}
