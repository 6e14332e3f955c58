// Connection Pool Manager
//
// Builds the bounded connection pool behind a DataSource. The pool is lazy:
// no physical connection is opened until the first borrow. Isolation is
// applied once per physical connection, right after it is opened.

use crate::driver::Driver;
use crate::error::{map_acquire_error, map_sqlx_error};
use metarepo_core::domain::{IsolationLevel, RepositoryContext};
use metarepo_core::RepositoryError;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Postgres, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Resolved pool parameters, validated before any pool object exists
struct PoolSettings {
    driver: Driver,
    max_connections: u32,
    isolation: IsolationLevel,
    acquire_timeout: Duration,
    statement_cache_capacity: usize,
    isolation_statement: Option<Arc<str>>,
    validation_query: Option<Arc<str>>,
}

impl PoolSettings {
    fn from_context(context: &RepositoryContext) -> Result<Self, RepositoryError> {
        let driver = ConnectionPoolManager::validate(context)?;

        let max_connections = context
            .max_connections()
            .filter(|max| *max > 0)
            .ok_or_else(|| RepositoryError::PoolConstructionFailed {
                reason: "maximum connections must be a positive integer".to_string(),
            })?;

        let isolation = context.transaction_isolation().ok_or_else(|| {
            RepositoryError::PoolConstructionFailed {
                reason: format!(
                    "transaction isolation not set or invalid: '{}'",
                    context.transaction_isolation_raw()
                ),
            }
        })?;

        if !driver.supports(isolation) {
            return Err(RepositoryError::PoolConstructionFailed {
                reason: format!("{} driver does not support isolation level {}", driver, isolation),
            });
        }

        Ok(Self {
            driver,
            max_connections,
            isolation,
            acquire_timeout: context.acquire_timeout(),
            // Unbounded unless configured: every distinct statement stays cached
            // for the lifetime of its connection.
            statement_cache_capacity: context.statement_cache_capacity().unwrap_or(usize::MAX),
            isolation_statement: driver.isolation_statement(isolation).map(Arc::from),
            validation_query: context.validation_query().map(Arc::from),
        })
    }
}

/// Builds [`DataSource`]s from a repository configuration snapshot
pub struct ConnectionPoolManager;

impl ConnectionPoolManager {
    /// Check URL and driver without touching the database
    pub fn validate(context: &RepositoryContext) -> Result<Driver, RepositoryError> {
        if context.connection_url().trim().is_empty() {
            return Err(RepositoryError::MissingConnectionUrl);
        }

        let identifier = context.driver().trim();
        if identifier.is_empty() {
            return Err(RepositoryError::MissingOrUnresolvableDriver { driver: None });
        }

        Driver::resolve(identifier).ok_or_else(|| RepositoryError::MissingOrUnresolvableDriver {
            driver: Some(identifier.to_string()),
        })
    }

    /// Build the pooled data source described by `context`
    pub fn build(context: &RepositoryContext) -> Result<DataSource, RepositoryError> {
        let settings = PoolSettings::from_context(context)?;
        let url = context.connection_url().trim();

        let pool = match settings.driver {
            Driver::Sqlite => PoolKind::Sqlite(build_sqlite(url, context, &settings)?),
            Driver::Postgres => PoolKind::Postgres(build_postgres(url, context, &settings)?),
        };

        info!(
            driver = %settings.driver,
            max_connections = settings.max_connections,
            isolation = %settings.isolation,
            acquire_timeout_ms = settings.acquire_timeout.as_millis() as u64,
            validation = settings.validation_query.is_some(),
            "Connection pool configured"
        );

        Ok(DataSource {
            pool,
            driver: settings.driver,
            isolation: settings.isolation,
            acquire_timeout: settings.acquire_timeout,
        })
    }
}

fn invalid_url(url: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::PoolConstructionFailed {
        reason: format!("invalid connection URL '{}': {}", url, err),
    }
}

fn build_sqlite(
    url: &str,
    context: &RepositoryContext,
    settings: &PoolSettings,
) -> Result<SqlitePool, RepositoryError> {
    let mut options = SqliteConnectOptions::from_str(url)
        .map_err(|e| invalid_url(url, e))?
        .statement_cache_capacity(settings.statement_cache_capacity);

    // Connection properties are handed to SQLite verbatim as pragmas
    for (key, value) in context.connection_properties() {
        options = options.pragma(key.clone(), value.clone());
    }

    let isolation_statement = settings.isolation_statement.clone();
    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .test_before_acquire(false)
        .after_connect(move |conn, _meta| {
            let statement = isolation_statement.clone();
            Box::pin(async move {
                if let Some(statement) = statement {
                    conn.execute(&*statement).await?;
                }
                Ok(())
            })
        });

    if let Some(query) = settings.validation_query.clone() {
        pool_options = pool_options.before_acquire(move |conn, _meta| {
            let query = query.clone();
            Box::pin(async move {
                conn.execute(&*query).await?;
                Ok(true)
            })
        });
    }

    Ok(pool_options.connect_lazy_with(options))
}

fn build_postgres(
    url: &str,
    context: &RepositoryContext,
    settings: &PoolSettings,
) -> Result<PgPool, RepositoryError> {
    let mut options = PgConnectOptions::from_str(url)
        .map_err(|e| invalid_url(url, e))?
        .statement_cache_capacity(settings.statement_cache_capacity);

    // Connection properties become session runtime parameters
    if !context.connection_properties().is_empty() {
        options = options.options(context.connection_properties().iter());
    }

    let isolation_statement = settings.isolation_statement.clone();
    let mut pool_options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .test_before_acquire(false)
        .after_connect(move |conn, _meta| {
            let statement = isolation_statement.clone();
            Box::pin(async move {
                if let Some(statement) = statement {
                    conn.execute(&*statement).await?;
                }
                Ok(())
            })
        });

    if let Some(query) = settings.validation_query.clone() {
        pool_options = pool_options.before_acquire(move |conn, _meta| {
            let query = query.clone();
            Box::pin(async move {
                conn.execute(&*query).await?;
                Ok(true)
            })
        });
    }

    Ok(pool_options.connect_lazy_with(options))
}

#[derive(Clone)]
enum PoolKind {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// Pooled connection resource handed to backend handlers
///
/// Cloning is cheap and shares the same underlying pool.
#[derive(Clone)]
pub struct DataSource {
    pool: PoolKind,
    driver: Driver,
    isolation: IsolationLevel,
    acquire_timeout: Duration,
}

impl DataSource {
    /// Borrow a connection, waiting at most the configured acquire timeout
    pub async fn acquire(&self) -> Result<PooledConnection, RepositoryError> {
        let conn = match &self.pool {
            PoolKind::Sqlite(pool) => pool.acquire().await.map(ConnectionKind::Sqlite),
            PoolKind::Postgres(pool) => pool.acquire().await.map(ConnectionKind::Postgres),
        }
        .map_err(|e| map_acquire_error(e, self.acquire_timeout, self.is_saturated()))?;

        debug!(driver = %self.driver, "Connection borrowed from pool");

        Ok(PooledConnection {
            conn,
            isolation: self.isolation,
        })
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn max_connections(&self) -> u32 {
        match &self.pool {
            PoolKind::Sqlite(pool) => pool.options().get_max_connections(),
            PoolKind::Postgres(pool) => pool.options().get_max_connections(),
        }
    }

    /// Physical connections currently open (idle + borrowed)
    pub fn size(&self) -> u32 {
        match &self.pool {
            PoolKind::Sqlite(pool) => pool.size(),
            PoolKind::Postgres(pool) => pool.size(),
        }
    }

    /// Every slot holds an open connection and none is idle
    fn is_saturated(&self) -> bool {
        self.size() >= self.max_connections() && self.num_idle() == 0
    }

    pub fn num_idle(&self) -> usize {
        match &self.pool {
            PoolKind::Sqlite(pool) => pool.num_idle(),
            PoolKind::Postgres(pool) => pool.num_idle(),
        }
    }

    /// Close every connection; pending and future borrows fail
    pub async fn close(&self) {
        match &self.pool {
            PoolKind::Sqlite(pool) => pool.close().await,
            PoolKind::Postgres(pool) => pool.close().await,
        }
        info!(driver = %self.driver, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        match &self.pool {
            PoolKind::Sqlite(pool) => pool.is_closed(),
            PoolKind::Postgres(pool) => pool.is_closed(),
        }
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("driver", &self.driver)
            .field("isolation", &self.isolation)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish_non_exhaustive()
    }
}

enum ConnectionKind {
    Sqlite(PoolConnection<Sqlite>),
    Postgres(PoolConnection<Postgres>),
}

/// Connection exclusively owned by its borrower; returned to the pool on drop
pub struct PooledConnection {
    conn: ConnectionKind,
    isolation: IsolationLevel,
}

impl PooledConnection {
    /// Isolation level the pool applied when this connection was opened
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    /// Ask the server which isolation level the session is running with
    pub async fn current_isolation_level(&mut self) -> Result<IsolationLevel, RepositoryError> {
        match &mut self.conn {
            ConnectionKind::Sqlite(conn) => {
                let dirty_reads: i64 = sqlx::query_scalar("PRAGMA read_uncommitted")
                    .fetch_one(&mut **conn)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(if dirty_reads != 0 {
                    IsolationLevel::ReadUncommitted
                } else {
                    IsolationLevel::Serializable
                })
            }
            ConnectionKind::Postgres(conn) => {
                let level: String = sqlx::query_scalar("SHOW transaction_isolation")
                    .fetch_one(&mut **conn)
                    .await
                    .map_err(map_sqlx_error)?;

                level
                    .parse()
                    .map_err(RepositoryError::Database)
            }
        }
    }

    pub fn as_sqlite(&mut self) -> Option<&mut SqliteConnection> {
        match &mut self.conn {
            ConnectionKind::Sqlite(conn) => Some(&mut **conn),
            ConnectionKind::Postgres(_) => None,
        }
    }

    pub fn as_postgres(&mut self) -> Option<&mut PgConnection> {
        match &mut self.conn {
            ConnectionKind::Postgres(conn) => Some(&mut **conn),
            ConnectionKind::Sqlite(_) => None,
        }
    }
}
