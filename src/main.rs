//! opa-admission-controller - validating admission webhook backed by Open Policy Agent.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Parses configuration from flags and environment
//! - Starts the plaintext and (if certificates exist) TLS listeners
//! - Drains and stops both listeners on SIGTERM or SIGINT

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use opa_admission_controller::{Config, HealthState, build_app, start};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("opa_admission_controller=info".parse()?),
        )
        .json()
        .init();

    let config = Config::parse();
    info!(
        http_port = config.http_port,
        https_port = config.https_port,
        "Starting opa-admission-controller"
    );

    // reqwest and axum-server both enable a rustls provider; pick one for the process
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let health_state = Arc::new(HealthState::new());
    let app = build_app(&config, health_state.clone())?;

    let mut server = match start(&config, app).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to start listeners");
            return Err(e.into());
        }
    };
    health_state.set_ready(true).await;

    // Wait for a listener to fail, or shutdown signal
    let listener_exit = tokio::select! {
        result = server.wait() => Some(result),
        _ = shutdown_signal() => None,
    };

    // Stop receiving new reviews before draining
    health_state.set_ready(false).await;

    if let Some(result) = listener_exit {
        // A webhook that cannot serve its port must not keep running degraded
        let e: Box<dyn std::error::Error> = match result {
            Ok(()) => "listener stopped unexpectedly".into(),
            Err(e) => e.into(),
        };
        error!(error = %e, "Listener failed, shutting down");
        if let Err(shutdown_err) = server.shutdown(Some(config.shutdown_grace())).await {
            error!(error = %shutdown_err, "Error while stopping remaining listener");
        }
        return Err(e);
    }

    info!("Received shutdown signal, initiating graceful shutdown...");
    server.shutdown(Some(config.shutdown_grace())).await?;

    info!("Webhook stopped");
    Ok(())
}

/// Resolves when the kubelet sends SIGTERM on pod deletion, or on Ctrl+C
/// when run locally.
///
/// Panics if a handler cannot be registered; without one the listeners
/// could never be drained.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("registering SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("registering SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
