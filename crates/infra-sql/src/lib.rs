// Metarepo Infrastructure - Pooled SQL Repository Provisioning
// Implements: RepositoryProvider, built-in SQLite backend handler

mod driver;
mod error;
mod handler;
mod migration;
mod pool;
mod provider;
mod sqlite_handler;

pub use driver::Driver;
pub use handler::{HandlerFactory, HandlerRegistry, RepositoryHandler};
pub use migration::{run_migrations, LATEST_SCHEMA_VERSION};
pub use pool::{ConnectionPoolManager, DataSource, PooledConnection};
pub use provider::{ProviderState, SqlRepositoryProvider};
pub use sqlite_handler::{SqliteRepository, SqliteRepositoryHandler, HANDLER_ID as SQLITE_HANDLER_ID};
