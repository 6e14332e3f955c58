// Built-in SQLite Backend Handler

use crate::driver::Driver;
use crate::error::map_sqlx_error;
use crate::handler::RepositoryHandler;
use crate::migration::{current_schema_version, run_migrations};
use crate::pool::DataSource;
use async_trait::async_trait;
use metarepo_core::domain::RepositoryContext;
use metarepo_core::port::Repository;
use metarepo_core::{AppError, Result};
use std::sync::Arc;
use tracing::info;

/// Registry identifier of the SQLite backend
pub const HANDLER_ID: &str = "sqlite";

/// Installs the repository schema and builds a [`SqliteRepository`]
#[derive(Default)]
pub struct SqliteRepositoryHandler {
    repository: Option<Arc<SqliteRepository>>,
}

impl SqliteRepositoryHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryHandler for SqliteRepositoryHandler {
    async fn initialize(
        &mut self,
        data_source: DataSource,
        _context: &RepositoryContext,
    ) -> Result<()> {
        if data_source.driver() != Driver::Sqlite {
            return Err(AppError::Config(format!(
                "sqlite handler cannot run on the {} driver",
                data_source.driver()
            )));
        }

        let mut pooled = data_source.acquire().await?;
        let conn = pooled
            .as_sqlite()
            .ok_or_else(|| AppError::Internal("expected a sqlite connection".to_string()))?;

        let version = run_migrations(conn).await.map_err(map_sqlx_error)?;
        info!(schema_version = version, "SQLite repository schema ready");

        self.repository = Some(Arc::new(SqliteRepository { data_source }));
        Ok(())
    }

    fn repository(&self) -> Option<Arc<dyn Repository>> {
        self.repository
            .clone()
            .map(|repo| repo as Arc<dyn Repository>)
    }
}

/// Repository facade over the pooled SQLite data source
pub struct SqliteRepository {
    data_source: DataSource,
}

#[async_trait]
impl Repository for SqliteRepository {
    fn backend(&self) -> &str {
        HANDLER_ID
    }

    async fn schema_version(&self) -> Result<i64> {
        let mut pooled = self.data_source.acquire().await?;
        let conn = pooled
            .as_sqlite()
            .ok_or_else(|| AppError::Internal("expected a sqlite connection".to_string()))?;

        let version = current_schema_version(conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(version)
    }
}
