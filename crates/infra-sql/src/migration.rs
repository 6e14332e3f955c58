// Schema Migration Runner (SQLite backend)

use sqlx::{Connection, SqliteConnection};
use tracing::info;

/// Bundled migrations, applied in order
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "Repository schema bookkeeping",
    include_str!("../migrations/001_repository_schema.sql"),
)];

/// Latest schema version this crate knows how to install
pub const LATEST_SCHEMA_VERSION: i64 = 1;

/// Run pending migrations, returning the resulting schema version
pub async fn run_migrations(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let current_version = current_schema_version(conn).await?;
    info!(current_version, "Checking repository schema");

    for (version, description, sql) in MIGRATIONS {
        if *version > current_version {
            info!(version, description, "Applying repository migration");
            apply_migration(conn, *version, description, sql).await?;
        }
    }

    current_schema_version(conn).await
}

/// Highest applied version, 0 when the schema has never been installed
pub async fn current_schema_version(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let table_exists: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='repository_schema'",
    )
    .fetch_one(&mut *conn)
    .await?;

    if table_exists == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM repository_schema")
        .fetch_one(&mut *conn)
        .await?;

    Ok(version.unwrap_or(0))
}

/// Apply a single migration SQL file and record it, atomically
async fn apply_migration(
    conn: &mut SqliteConnection,
    version: i64,
    description: &str,
    sql: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;

    for statement in sql.split(';') {
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement).execute(&mut *tx).await?;
        }
    }

    sqlx::query("INSERT INTO repository_schema (version, description, applied_at) VALUES (?, ?, ?)")
        .bind(version)
        .bind(description)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();

        assert_eq!(current_schema_version(&mut conn).await.unwrap(), 0);
        assert_eq!(
            run_migrations(&mut conn).await.unwrap(),
            LATEST_SCHEMA_VERSION
        );
        assert_eq!(
            run_migrations(&mut conn).await.unwrap(),
            LATEST_SCHEMA_VERSION
        );

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM repository_schema")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
