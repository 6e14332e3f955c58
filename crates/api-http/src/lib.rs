//! HTTP Dispatch Layer
//!
//! Wraps every inbound request in a [`RequestContext`], runs the matching
//! [`RequestHandler`] and converts its outcome into a JSON response. Handler
//! failures always become structured 500 responses.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use context::RequestContext;
pub use dispatcher::dispatch;
pub use handler::{RepositoryInfoHandler, RequestHandler, VersionHandler};
pub use server::{HttpServer, HttpServerConfig, HttpServerHandle};
