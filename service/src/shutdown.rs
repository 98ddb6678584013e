//! Graceful shutdown coordination.
//!
//! - **ShutdownHandler trait**: components implement this for cleanup
//! - **ShutdownCoordinator**: broadcasts the signal, runs handlers under a timeout
//! - **wait_for_signal()**: waits for SIGTERM or Ctrl+C
//!
//! ## Usage
//!
//! ```ignore
//! let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(30));
//! coordinator.register(Arc::new(ConsumerShutdown::new(app.clone())));
//!
//! let bootstrap = app.spawn_bootstrap(coordinator.subscribe());
//!
//! wait_for_signal().await;
//! coordinator.shutdown().await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// A component that needs cleanup before the process exits.
#[async_trait]
pub trait ShutdownHandler: Send + Sync {
    /// Component name for logging
    fn name(&self) -> &str;

    /// Finish in-flight work and release resources.
    ///
    /// # Errors
    ///
    /// Returns a description of what could not be released.
    async fn shutdown(&self) -> Result<(), String>;
}

/// Broadcasts the shutdown signal and runs every registered handler.
///
/// Handlers run in parallel, each bounded by the same timeout.
pub struct ShutdownCoordinator {
    handlers: Vec<Arc<dyn ShutdownHandler>>,
    shutdown_tx: broadcast::Sender<()>,
    timeout_duration: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator; `timeout` bounds each handler.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            handlers: Vec::new(),
            shutdown_tx,
            timeout_duration: timeout,
        }
    }

    /// Register a shutdown handler.
    pub fn register(&mut self, handler: Arc<dyn ShutdownHandler>) {
        info!(handler = handler.name(), "Registered shutdown handler");
        self.handlers.push(handler);
    }

    /// Receiver notified when shutdown starts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcast the signal, then shut every handler down.
    ///
    /// # Errors
    ///
    /// Returns one message per handler that failed or timed out.
    pub async fn shutdown(&self) -> Result<(), Vec<String>> {
        info!(
            handlers = self.handlers.len(),
            timeout = ?self.timeout_duration,
            "Initiating graceful shutdown"
        );

        if self.shutdown_tx.send(()).is_err() {
            warn!("No active shutdown signal receivers");
        }

        let shutdowns = self.handlers.iter().map(|handler| async move {
            let name = handler.name();
            match tokio::time::timeout(self.timeout_duration, handler.shutdown()).await {
                Ok(Ok(())) => {
                    info!(component = name, "Component shut down");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(component = name, error = %e, "Component shutdown failed");
                    Err(format!("{name}: {e}"))
                }
                Err(_) => {
                    error!(component = name, "Component shutdown timed out");
                    Err(format!("{name}: timeout after {:?}", self.timeout_duration))
                }
            }
        });

        let errors: Vec<String> = futures::future::join_all(shutdowns)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            info!("All components shut down successfully");
            Ok(())
        } else {
            error!(errors = errors.len(), "Shutdown completed with errors");
            Err(errors)
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the error is logged and the other signal
/// is still honoured.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
