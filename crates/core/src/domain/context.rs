// Repository Configuration View
//
// Read-only snapshot of the `repository.*` configuration keys. Getters report
// missing values as empty strings or `None`; validation belongs to the caller.

use crate::domain::IsolationLevel;
use crate::error::Result;
use config::{Config, Environment, File};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const KEY_URL: &str = "repository.url";
pub const KEY_DRIVER: &str = "repository.driver";
pub const KEY_HANDLER: &str = "repository.handler";
pub const KEY_MAX_CONNECTIONS: &str = "repository.max_connections";
pub const KEY_TRANSACTION_ISOLATION: &str = "repository.transaction_isolation";
pub const KEY_ACQUIRE_TIMEOUT_MS: &str = "repository.acquire_timeout_ms";
pub const KEY_VALIDATION_QUERY: &str = "repository.validation_query";
pub const KEY_STATEMENT_CACHE_CAPACITY: &str = "repository.statement_cache_capacity";
pub const KEY_PROPERTIES: &str = "repository.properties";

/// Environment variable prefix (`METAREPO_REPOSITORY__URL` -> `repository.url`)
pub const ENV_PREFIX: &str = "METAREPO";

pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Load layered configuration: optional file first, environment on top
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        debug!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(config)
}

/// Immutable repository configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContext {
    connection_url: String,
    driver: String,
    handler: String,
    max_connections: Option<u32>,
    transaction_isolation: String,
    acquire_timeout_ms: Option<u64>,
    validation_query: Option<String>,
    statement_cache_capacity: Option<usize>,
    connection_properties: BTreeMap<String, String>,
}

impl RepositoryContext {
    pub fn builder() -> RepositoryContextBuilder {
        RepositoryContextBuilder::default()
    }

    /// Take a snapshot of the `repository.*` keys
    pub fn from_config(config: &Config) -> Self {
        let string = |key: &str| config.get_string(key).unwrap_or_default();

        let connection_properties = config
            .get_table(KEY_PROPERTIES)
            .map(|table| {
                table
                    .into_iter()
                    .filter_map(|(k, v)| v.into_string().ok().map(|v| (k, v)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            connection_url: string(KEY_URL),
            driver: string(KEY_DRIVER),
            handler: string(KEY_HANDLER),
            max_connections: config
                .get_int(KEY_MAX_CONNECTIONS)
                .ok()
                .and_then(|n| u32::try_from(n).ok()),
            transaction_isolation: string(KEY_TRANSACTION_ISOLATION),
            acquire_timeout_ms: config
                .get_int(KEY_ACQUIRE_TIMEOUT_MS)
                .ok()
                .and_then(|n| u64::try_from(n).ok()),
            validation_query: config
                .get_string(KEY_VALIDATION_QUERY)
                .ok()
                .filter(|q| !q.trim().is_empty()),
            statement_cache_capacity: config
                .get_int(KEY_STATEMENT_CACHE_CAPACITY)
                .ok()
                .and_then(|n| usize::try_from(n).ok()),
            connection_properties,
        }
    }

    pub fn connection_url(&self) -> &str {
        &self.connection_url
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn max_connections(&self) -> Option<u32> {
        self.max_connections
    }

    /// Configured isolation level; `None` when unset or not a known level
    pub fn transaction_isolation(&self) -> Option<IsolationLevel> {
        self.transaction_isolation.parse().ok()
    }

    /// Isolation value exactly as configured (for diagnostics)
    pub fn transaction_isolation_raw(&self) -> &str {
        &self.transaction_isolation
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_MS))
    }

    pub fn validation_query(&self) -> Option<&str> {
        self.validation_query.as_deref()
    }

    /// Per-connection statement cache bound; `None` means unbounded
    pub fn statement_cache_capacity(&self) -> Option<usize> {
        self.statement_cache_capacity
    }

    pub fn connection_properties(&self) -> &BTreeMap<String, String> {
        &self.connection_properties
    }
}

/// Programmatic construction of a [`RepositoryContext`]
#[derive(Debug, Default)]
pub struct RepositoryContextBuilder {
    inner: RepositoryContext,
}

impl RepositoryContextBuilder {
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.inner.connection_url = url.into();
        self
    }

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.inner.driver = driver.into();
        self
    }

    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.inner.handler = handler.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.inner.max_connections = Some(max);
        self
    }

    pub fn transaction_isolation(mut self, level: IsolationLevel) -> Self {
        self.inner.transaction_isolation = level.to_string();
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.inner.acquire_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn validation_query(mut self, query: impl Into<String>) -> Self {
        self.inner.validation_query = Some(query.into());
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.inner.statement_cache_capacity = Some(capacity);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .connection_properties
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> RepositoryContext {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_yield_empty_values() {
        let config = Config::builder().build().unwrap();
        let ctx = RepositoryContext::from_config(&config);

        assert_eq!(ctx.connection_url(), "");
        assert_eq!(ctx.driver(), "");
        assert_eq!(ctx.handler(), "");
        assert_eq!(ctx.max_connections(), None);
        assert_eq!(ctx.transaction_isolation(), None);
        assert_eq!(ctx.validation_query(), None);
        assert_eq!(ctx.statement_cache_capacity(), None);
        assert!(ctx.connection_properties().is_empty());
        assert_eq!(
            ctx.acquire_timeout(),
            Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_from_config_reads_all_keys() {
        let config = Config::builder()
            .set_override(KEY_URL, "sqlite::memory:")
            .unwrap()
            .set_override(KEY_DRIVER, "sqlite")
            .unwrap()
            .set_override(KEY_HANDLER, "sqlite")
            .unwrap()
            .set_override(KEY_MAX_CONNECTIONS, 4_i64)
            .unwrap()
            .set_override(KEY_TRANSACTION_ISOLATION, "read_uncommitted")
            .unwrap()
            .set_override(KEY_ACQUIRE_TIMEOUT_MS, 250_i64)
            .unwrap()
            .set_override(KEY_VALIDATION_QUERY, "SELECT 1")
            .unwrap()
            .set_override("repository.properties.busy_timeout", "5000")
            .unwrap()
            .build()
            .unwrap();

        let ctx = RepositoryContext::from_config(&config);

        assert_eq!(ctx.connection_url(), "sqlite::memory:");
        assert_eq!(ctx.driver(), "sqlite");
        assert_eq!(ctx.handler(), "sqlite");
        assert_eq!(ctx.max_connections(), Some(4));
        assert_eq!(
            ctx.transaction_isolation(),
            Some(IsolationLevel::ReadUncommitted)
        );
        assert_eq!(ctx.acquire_timeout(), Duration::from_millis(250));
        assert_eq!(ctx.validation_query(), Some("SELECT 1"));
        assert_eq!(
            ctx.connection_properties().get("busy_timeout"),
            Some(&"5000".to_string())
        );
    }

    #[test]
    fn test_negative_max_connections_is_missing() {
        let config = Config::builder()
            .set_override(KEY_MAX_CONNECTIONS, -3_i64)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(RepositoryContext::from_config(&config).max_connections(), None);
    }

    #[test]
    fn test_unknown_isolation_keeps_raw_value() {
        let config = Config::builder()
            .set_override(KEY_TRANSACTION_ISOLATION, "SNAPSHOT")
            .unwrap()
            .build()
            .unwrap();
        let ctx = RepositoryContext::from_config(&config);

        assert_eq!(ctx.transaction_isolation(), None);
        assert_eq!(ctx.transaction_isolation_raw(), "SNAPSHOT");
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metarepo.toml");
        std::fs::write(
            &path,
            r#"
            [repository]
            url = "sqlite://meta.db"
            driver = "sqlite"
            handler = "sqlite"
            max_connections = 2
            transaction_isolation = "SERIALIZABLE"

            [repository.properties]
            foreign_keys = "ON"
            "#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        let ctx = RepositoryContext::from_config(&config);

        assert_eq!(ctx.connection_url(), "sqlite://meta.db");
        assert_eq!(ctx.max_connections(), Some(2));
        assert_eq!(
            ctx.transaction_isolation(),
            Some(IsolationLevel::Serializable)
        );
        assert_eq!(
            ctx.connection_properties().get("foreign_keys"),
            Some(&"ON".to_string())
        );
    }

    #[test]
    fn test_builder() {
        let ctx = RepositoryContext::builder()
            .connection_url("sqlite::memory:")
            .driver("sqlite")
            .handler("sqlite")
            .max_connections(1)
            .transaction_isolation(IsolationLevel::Serializable)
            .property("foreign_keys", "ON")
            .build();

        assert_eq!(ctx.max_connections(), Some(1));
        assert_eq!(ctx.transaction_isolation(), Some(IsolationLevel::Serializable));
        assert_eq!(ctx.connection_properties().len(), 1);
    }
}
