//! Service lifecycle management.
//!
//! Provides the main service runner with signal handling and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api;
use crate::config::ControlConfig;
use crate::deployment::DeployedWorkerService;
use crate::error::{ControlError, ControlResult};
use crate::ids::UlidFriendlyIds;
use crate::store::{DeploymentStore, PostgresStore};

/// The control service.
///
/// Owns the store connection, the registration service and the HTTP API.
pub struct ControlService {
    config: ControlConfig,
    cancel: CancellationToken,
}

impl ControlService {
    /// Create a new control service with the given configuration.
    #[must_use]
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the control service until a shutdown signal arrives.
    ///
    /// Fails if PostgreSQL cannot be reached.
    pub async fn run(&self) -> ControlResult<()> {
        let store = self.create_store().await?;

        let service = Arc::new(DeployedWorkerService::with_label(
            Arc::clone(&store),
            Arc::new(UlidFriendlyIds),
            self.config.promotion.label.clone(),
        ));
        info!(label = %service.label(), "registration service initialised");

        let app = api::router(api::AppState { service, store });

        serve(self.config.server.listen_addr, app, self.cancel.clone()).await?;

        info!("control service shutdown complete");
        Ok(())
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn create_store(&self) -> ControlResult<Arc<dyn DeploymentStore>> {
        let target = self.config.database.target();
        let store = match PostgresStore::connect(&self.config.database).await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, database = %target, "failed to connect to PostgreSQL");
                return Err(e);
            }
        };

        info!(database = %target, "connected to PostgreSQL");
        Ok(Arc::new(store))
    }
}

async fn serve(
    addr: SocketAddr,
    app: axum::Router,
    cancel: CancellationToken,
) -> ControlResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControlError::Config(format!("failed to bind {addr}: {e}")))?;

    info!(listen_addr = %addr, "control service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .map_err(|e| ControlError::internal(format!("server error: {e}")))
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }
}
