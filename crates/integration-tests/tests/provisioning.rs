//! Repository Provisioning Integration Tests
//!
//! Configuration file -> RepositoryContext -> SqlRepositoryProvider, end to end.

use std::error::Error as _;
use std::io::Write;
use std::sync::Arc;

use metarepo_core::domain::{load_config, RepositoryContext};
use metarepo_core::port::RepositoryProvider;
use metarepo_core::{AppError, ErrorCode, RepositoryError};
use metarepo_infra_sql::{HandlerRegistry, ProviderState, SqlRepositoryProvider, LATEST_SCHEMA_VERSION};
use tempfile::{NamedTempFile, TempDir};

fn write_config(body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn context_from(body: &str) -> RepositoryContext {
    let file = write_config(body);
    let config = load_config(Some(file.path())).unwrap();
    RepositoryContext::from_config(&config)
}

fn sqlite_config(dir: &TempDir, handler: &str) -> String {
    let db = dir.path().join("meta.db");
    format!(
        r#"
[repository]
url = "sqlite://{}?mode=rwc"
driver = "sqlite"
handler = "{}"
max_connections = 2
transaction_isolation = "SERIALIZABLE"
acquire_timeout_ms = 1000
"#,
        db.display(),
        handler
    )
}

fn provider() -> SqlRepositoryProvider {
    SqlRepositoryProvider::new(HandlerRegistry::with_builtin_handlers())
}

fn repository_error(err: AppError) -> RepositoryError {
    match err {
        AppError::Repository(e) => e,
        other => panic!("expected repository error, got {}", other),
    }
}

/// Valid file configuration yields a READY provider serving one repository
#[tokio::test]
async fn test_file_configuration_provisions_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_from(&sqlite_config(&dir, "sqlite"));
    let provider = provider();

    provider.initialize(ctx).await.unwrap();
    assert_eq!(provider.state().await, ProviderState::Ready);

    let first = provider.repository().await.unwrap();
    let second = provider.repository().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.backend(), "sqlite");
    assert_eq!(first.schema_version().await.unwrap(), LATEST_SCHEMA_VERSION);

    provider.shutdown().await;
}

/// Schema survives a provider restart against the same database file
#[tokio::test]
async fn test_reprovision_keeps_schema() {
    let dir = tempfile::tempdir().unwrap();
    let body = sqlite_config(&dir, "sqlite");

    let provider = provider();
    provider.initialize(context_from(&body)).await.unwrap();
    provider.shutdown().await;

    provider.initialize(context_from(&body)).await.unwrap();
    let repo = provider.repository().await.unwrap();
    assert_eq!(repo.schema_version().await.unwrap(), LATEST_SCHEMA_VERSION);

    provider.shutdown().await;
}

/// Scenario: blank URL
#[tokio::test]
async fn test_blank_url_scenario() {
    let ctx = context_from(
        r#"
[repository]
url = ""
driver = "x"
handler = "y"
"#,
    );
    let provider = provider();

    let err = provider.initialize(ctx).await.unwrap_err();
    assert_eq!(err.code(), "REPO_0002");
    assert!(matches!(
        repository_error(err),
        RepositoryError::MissingConnectionUrl
    ));
    assert_eq!(provider.state().await, ProviderState::Uninitialized);
}

/// Scenario: driver cannot be resolved
#[tokio::test]
async fn test_unresolvable_driver_scenario() {
    let ctx = context_from(
        r#"
[repository]
url = "jdbc:test"
driver = "missing.Driver"
handler = "y"
"#,
    );

    let err = provider().initialize(ctx).await.unwrap_err();
    assert_eq!(err.code(), "REPO_0003");
    assert!(err.to_string().contains("missing.Driver"));
}

/// Scenario: handler identifier not registered
#[tokio::test]
async fn test_unknown_handler_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_from(&sqlite_config(&dir, "com.acme.MissingHandler"));
    let provider = provider();

    let err = repository_error(provider.initialize(ctx).await.unwrap_err());
    assert!(matches!(err, RepositoryError::HandlerNotFound { .. }));

    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    assert!(chain.iter().any(|m| m.contains("com.acme.MissingHandler")));

    // Nothing was provisioned; the database file was never created
    assert!(!dir.path().join("meta.db").exists());
    assert!(provider.repository().await.is_err());
}

/// Missing handler key is reported before the URL is looked at
#[tokio::test]
async fn test_missing_handler_key() {
    let ctx = context_from(
        r#"
[repository]
url = ""
driver = ""
"#,
    );

    let err = provider().initialize(ctx).await.unwrap_err();
    assert_eq!(err.code(), "REPO_0004");
}

/// Isolation level outside the SQLite driver's range fails pool construction
#[tokio::test]
async fn test_unsupported_isolation_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let body = sqlite_config(&dir, "sqlite").replace("SERIALIZABLE", "READ_COMMITTED");

    let err = provider().initialize(context_from(&body)).await.unwrap_err();
    assert_eq!(err.code(), "REPO_0006");
}
