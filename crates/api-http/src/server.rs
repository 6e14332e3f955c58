//! HTTP Server
//!
//! Binds the built-in handlers to their routes and serves them until the
//! returned [`HttpServerHandle`] is stopped.

use crate::context::RequestContext;
use crate::dispatcher::dispatch;
use crate::handler::{RepositoryInfoHandler, RequestHandler, VersionHandler};
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::routing::{get, MethodRouter};
use axum::Router;
use metarepo_core::port::RepositoryProvider;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 9530;

/// HTTP Server Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig {
    pub host: String,
    /// `0` picks an ephemeral port
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

pub struct HttpServer {
    config: HttpServerConfig,
    provider: Arc<dyn RepositoryProvider>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, provider: Arc<dyn RepositoryProvider>) -> Self {
        Self { config, provider }
    }

    /// Routes served by this server
    pub fn router(&self) -> Router {
        Router::new()
            .route("/version", dispatch_route(Arc::new(VersionHandler::new())))
            .route(
                "/v1/repository",
                dispatch_route(Arc::new(RepositoryInfoHandler::new(self.provider.clone()))),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task
    pub async fn start(self) -> std::io::Result<HttpServerHandle> {
        let listener =
            TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped sender also stops the server
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(%addr, "HTTP server listening");

        Ok(HttpServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

/// Running server
pub struct HttpServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl HttpServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn stop(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match self.task.await {
            Ok(result) => {
                info!(addr = %self.addr, "HTTP server stopped");
                result
            }
            Err(e) => {
                warn!(error = %e, "HTTP server task did not complete");
                Err(std::io::Error::other(e))
            }
        }
    }
}

/// GET/POST route that wraps the request and hands it to `handler`
fn dispatch_route(handler: Arc<dyn RequestHandler>) -> MethodRouter {
    let serve = move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
        let handler = handler.clone();
        async move {
            let ctx = RequestContext::new(method, uri.path(), headers, body);
            dispatch(handler.as_ref(), ctx).await
        }
    };

    get(serve.clone()).post(serve)
}
