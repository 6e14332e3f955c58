// Transaction Isolation Level

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transaction isolation applied uniformly to every pooled connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// Leave the driver default untouched
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL standard spelling (`READ COMMITTED`), `None` for [`IsolationLevel::None`]
    pub fn sql_name(&self) -> Option<&'static str> {
        match self {
            IsolationLevel::None => None,
            IsolationLevel::ReadUncommitted => Some("READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => Some("READ COMMITTED"),
            IsolationLevel::RepeatableRead => Some("REPEATABLE READ"),
            IsolationLevel::Serializable => Some("SERIALIZABLE"),
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationLevel::None => write!(f, "NONE"),
            IsolationLevel::ReadUncommitted => write!(f, "READ_UNCOMMITTED"),
            IsolationLevel::ReadCommitted => write!(f, "READ_COMMITTED"),
            IsolationLevel::RepeatableRead => write!(f, "REPEATABLE_READ"),
            IsolationLevel::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = String;

    /// Accepts `READ_COMMITTED`, `read-committed` and `read committed`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "NONE" => Ok(IsolationLevel::None),
            "READ_UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ_COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE_READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            _ => Err(format!("Unknown transaction isolation level: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!(
            "READ_COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "repeatable-read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            " serializable ".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert!("SNAPSHOT".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for level in [
            IsolationLevel::None,
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(level.to_string().parse::<IsolationLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_sql_name() {
        assert_eq!(IsolationLevel::None.sql_name(), None);
        assert_eq!(
            IsolationLevel::ReadUncommitted.sql_name(),
            Some("READ UNCOMMITTED")
        );
    }
}
