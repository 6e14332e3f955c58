// SQL Repository Provider
//
// State machine: UNINITIALIZED -> INITIALIZING -> READY. One async mutex
// covers both `initialize` and `repository`, so no caller observes a partially
// built pool or a missing repository once initialization has begun.

use crate::handler::{HandlerRegistry, RepositoryHandler};
use crate::pool::{ConnectionPoolManager, DataSource};
use async_trait::async_trait;
use metarepo_core::domain::RepositoryContext;
use metarepo_core::port::{Repository, RepositoryProvider};
use metarepo_core::{RepositoryError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Lifecycle of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Initializing,
    Ready,
}

impl std::fmt::Display for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderState::Uninitialized => write!(f, "UNINITIALIZED"),
            ProviderState::Initializing => write!(f, "INITIALIZING"),
            ProviderState::Ready => write!(f, "READY"),
        }
    }
}

/// Everything owned once the provider is READY
struct Provisioned {
    context: RepositoryContext,
    handler_id: String,
    // Kept alive for the process lifetime; the repository is served from cache
    _handler: Box<dyn RepositoryHandler>,
    data_source: DataSource,
    repository: Arc<dyn Repository>,
}

struct Inner {
    state: ProviderState,
    provisioned: Option<Provisioned>,
}

/// Repository provider backed by a pooled SQL data source
pub struct SqlRepositoryProvider {
    registry: HandlerRegistry,
    inner: Mutex<Inner>,
}

impl SqlRepositoryProvider {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            inner: Mutex::new(Inner {
                state: ProviderState::Uninitialized,
                provisioned: None,
            }),
        }
    }

    pub async fn state(&self) -> ProviderState {
        self.inner.lock().await.state
    }

    /// Configuration snapshot the provider was initialized with
    pub async fn context(&self) -> Option<RepositoryContext> {
        let inner = self.inner.lock().await;
        inner.provisioned.as_ref().map(|p| p.context.clone())
    }

    /// Identifier of the active backend handler
    pub async fn handler_id(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.provisioned.as_ref().map(|p| p.handler_id.clone())
    }

    /// Close the pool and return to UNINITIALIZED
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(provisioned) = inner.provisioned.take() {
            provisioned.data_source.close().await;
            info!(handler = %provisioned.handler_id, "Repository provider shut down");
        }
        inner.state = ProviderState::Uninitialized;
    }

    async fn provision(
        &self,
        context: RepositoryContext,
    ) -> std::result::Result<Provisioned, RepositoryError> {
        let handler_id = context.handler().trim().to_string();
        if handler_id.is_empty() {
            return Err(RepositoryError::MissingHandlerIdentifier);
        }

        // Fail on URL/driver before anything is instantiated
        ConnectionPoolManager::validate(&context)?;

        let mut handler = self.registry.load(&handler_id)?;
        let data_source = ConnectionPoolManager::build(&context)?;

        if let Err(cause) = handler.initialize(data_source.clone(), &context).await {
            data_source.close().await;
            return Err(RepositoryError::HandlerInitializationFailed {
                identifier: handler_id,
                cause: Box::new(cause),
            });
        }

        let Some(repository) = handler.repository() else {
            data_source.close().await;
            return Err(RepositoryError::HandlerInitializationFailed {
                identifier: handler_id,
                cause: "handler returned no repository after initialization".into(),
            });
        };

        Ok(Provisioned {
            context,
            handler_id,
            _handler: handler,
            data_source,
            repository,
        })
    }
}

#[async_trait]
impl RepositoryProvider for SqlRepositoryProvider {
    async fn initialize(&self, context: RepositoryContext) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.state == ProviderState::Ready {
            warn!("Repository provider already initialized; ignoring repeated initialize");
            return Ok(());
        }

        inner.state = ProviderState::Initializing;

        match self.provision(context).await {
            Ok(provisioned) => {
                info!(
                    handler = %provisioned.handler_id,
                    driver = %provisioned.data_source.driver(),
                    max_connections = provisioned.data_source.max_connections(),
                    isolation = %provisioned.data_source.isolation_level(),
                    "Repository initialized"
                );
                inner.provisioned = Some(provisioned);
                inner.state = ProviderState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Repository initialization failed");
                inner.state = ProviderState::Uninitialized;
                Err(e.into())
            }
        }
    }

    async fn repository(&self) -> Result<Arc<dyn Repository>> {
        let inner = self.inner.lock().await;

        match (&inner.state, &inner.provisioned) {
            (ProviderState::Ready, Some(provisioned)) => Ok(provisioned.repository.clone()),
            _ => Err(RepositoryError::NotInitialized.into()),
        }
    }
}
