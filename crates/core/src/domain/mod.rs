// Domain Layer - Configuration snapshot and isolation policy

pub mod context;
pub mod isolation;

// Re-exports
pub use context::{load_config, RepositoryContext, RepositoryContextBuilder};
pub use isolation::IsolationLevel;
