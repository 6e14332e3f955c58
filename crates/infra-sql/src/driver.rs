// Database Driver Resolution

use metarepo_core::domain::IsolationLevel;

/// Database driver a connection URL is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Sqlite,
    Postgres,
}

impl Driver {
    /// Resolve a configured driver identifier; `None` when unknown
    pub fn resolve(identifier: &str) -> Option<Self> {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Driver::Sqlite),
            "postgres" | "postgresql" | "pg" => Some(Driver::Postgres),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
            Driver::Postgres => "postgres",
        }
    }

    /// Whether connections of this driver can be pinned to `level`
    ///
    /// SQLite only distinguishes dirty reads (shared-cache mode) from its
    /// default serializable behaviour.
    pub fn supports(&self, level: IsolationLevel) -> bool {
        match self {
            Driver::Sqlite => matches!(
                level,
                IsolationLevel::None | IsolationLevel::ReadUncommitted | IsolationLevel::Serializable
            ),
            Driver::Postgres => true,
        }
    }

    /// Statement run on every new connection to apply `level`
    pub fn isolation_statement(&self, level: IsolationLevel) -> Option<String> {
        match self {
            Driver::Sqlite => match level {
                IsolationLevel::ReadUncommitted => Some("PRAGMA read_uncommitted = 1".to_string()),
                IsolationLevel::Serializable => Some("PRAGMA read_uncommitted = 0".to_string()),
                _ => None,
            },
            Driver::Postgres => level.sql_name().map(|name| {
                format!(
                    "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}",
                    name
                )
            }),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
