// Port Layer - Interfaces for external dependencies

pub mod provider;
pub mod repository;

// Re-exports
pub use provider::RepositoryProvider;
pub use repository::Repository;
