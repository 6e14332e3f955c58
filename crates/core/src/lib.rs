// Metarepo Core - Configuration View, Error Taxonomy & Ports
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, ErrorCode, RepositoryError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
