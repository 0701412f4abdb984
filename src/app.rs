//! Application assembly and lifecycle.

use crate::config::{Config, load_config};
use crate::state::AppState;
use crate::web::routes::create_router;
use anyhow::Context;
use std::future::IntoFuture;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// Create a new App instance with all components initialized.
    pub async fn new() -> anyhow::Result<Self> {
        let config: Config = load_config().context("Failed to load config")?;
        let state = AppState::new(config.clone()).await?;

        info!(
            backend = state.store.backend_name(),
            origin = %config.origin_base_url,
            "cache layer initialized"
        );

        Ok(App { config, state })
    }

    /// Serve the web API until a shutdown signal arrives, then drain
    /// in-flight requests within the configured grace period.
    pub async fn run(self) -> ExitCode {
        let router = create_router(self.state);
        let addr = format!("0.0.0.0:{}", self.config.port);

        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(addr, error = %e, "failed to bind");
                return ExitCode::FAILURE;
            }
        };
        info!(addr, "web service listening");

        let shutdown = CancellationToken::new();
        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.cancel();
            });
        }

        let drain = shutdown.clone();
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move { drain.cancelled().await })
            .into_future();
        let mut serve = std::pin::pin!(serve);

        tokio::select! {
            result = &mut serve => {
                // Server ended before any signal: that is a failure.
                if let Err(e) = result {
                    error!(error = %e, "server error");
                }
                return ExitCode::FAILURE;
            }
            _ = shutdown.cancelled() => {}
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut serve).await {
            Ok(Ok(())) => {
                info!("shutdown complete");
                ExitCode::SUCCESS
            }
            Ok(Err(e)) => {
                error!(error = %e, "server error during drain");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    timeout = ?self.config.shutdown_timeout,
                    "graceful shutdown window elapsed, exiting"
                );
                ExitCode::SUCCESS
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
