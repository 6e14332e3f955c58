// Backend Handler Port & Registry
//
// Backend handlers are selected at startup by identifier. The registry maps
// identifiers to factories instead of loading implementations by name.

use crate::pool::DataSource;
use async_trait::async_trait;
use metarepo_core::domain::RepositoryContext;
use metarepo_core::error::BoxError;
use metarepo_core::port::Repository;
use metarepo_core::{RepositoryError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Turns a pooled data source into a concrete repository facade
#[async_trait]
pub trait RepositoryHandler: Send + Sync {
    /// Perform backend-specific setup (schema, checks)
    ///
    /// Any unrecoverable condition must be reported as an error.
    async fn initialize(&mut self, data_source: DataSource, context: &RepositoryContext)
        -> Result<()>;

    /// Repository built by `initialize`; `None` before it has succeeded
    fn repository(&self) -> Option<Arc<dyn Repository>>;
}

/// Creates a fresh, uninitialized handler instance
pub type HandlerFactory =
    Arc<dyn Fn() -> std::result::Result<Box<dyn RepositoryHandler>, BoxError> + Send + Sync>;

/// Identifier -> handler factory lookup
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the handlers shipped in this crate
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(crate::sqlite_handler::HANDLER_ID, || {
            let handler = crate::sqlite_handler::SqliteRepositoryHandler::new();
            Ok(Box::new(handler) as Box<dyn RepositoryHandler>)
        });
        registry
    }

    /// Register (or replace) the factory for `identifier`
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn() -> std::result::Result<Box<dyn RepositoryHandler>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        let identifier = identifier.into();
        debug!(handler = %identifier, "Registering repository handler");
        self.factories.insert(identifier, Arc::new(factory));
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve `identifier` and instantiate its handler
    ///
    /// Unknown identifiers and failing factories both surface as
    /// `HandlerNotFound`.
    pub fn load(
        &self,
        identifier: &str,
    ) -> std::result::Result<Box<dyn RepositoryHandler>, RepositoryError> {
        let factory =
            self.factories
                .get(identifier)
                .ok_or_else(|| RepositoryError::HandlerNotFound {
                    identifier: identifier.to_string(),
                    cause: Some(format!("no handler registered under '{}'", identifier).into()),
                })?;

        factory().map_err(|cause| RepositoryError::HandlerNotFound {
            identifier: identifier.to_string(),
            cause: Some(cause),
        })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.identifiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_builtin_registry_contains_sqlite() {
        let registry = HandlerRegistry::with_builtin_handlers();
        assert!(registry.contains("sqlite"));
        assert_eq!(registry.identifiers(), vec!["sqlite"]);
    }

    #[test]
    fn test_unknown_identifier_is_not_found() {
        let registry = HandlerRegistry::with_builtin_handlers();

        match registry.load("com.acme.MissingHandler") {
            Err(err @ RepositoryError::HandlerNotFound { .. }) => {
                assert!(err.to_string().contains("com.acme.MissingHandler"));
                assert!(err
                    .source()
                    .unwrap()
                    .to_string()
                    .contains("com.acme.MissingHandler"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected HandlerNotFound"),
        }
    }

    #[test]
    fn test_failing_factory_is_not_found_with_cause() {
        let mut registry = HandlerRegistry::new();
        registry.register("broken", || Err("constructor exploded".into()));

        match registry.load("broken") {
            Err(err @ RepositoryError::HandlerNotFound { .. }) => {
                assert_eq!(err.source().unwrap().to_string(), "constructor exploded");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected HandlerNotFound"),
        }
    }

    #[test]
    fn test_load_returns_fresh_uninitialized_handler() {
        let registry = HandlerRegistry::with_builtin_handlers();
        let handler = registry.load("sqlite").unwrap();
        assert!(handler.repository().is_none());
    }
}
