//! Listener lifecycle for the webhook.
//!
//! A plaintext listener always runs (handy for debugging, not meant to be
//! exposed in production). A TLS listener runs alongside it when the
//! certificate file exists. Both serve the same router from their own task.
//!
//! [`start`] returns a [`ServerHandle`], the single owner of both listeners.
//! Shutting down consumes the handle, so it can only happen once.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ServerError;

const PLAINTEXT: &str = "http";
const TLS: &str = "https";

/// One running listener and the means to stop it
struct Listener {
    name: &'static str,
    addr: SocketAddr,
    handle: Handle,
    /// `None` once the serve task has been joined
    task: Option<JoinHandle<io::Result<()>>>,
}

impl Listener {
    /// Spawn `serve` and wait until it has bound its port.
    async fn launch<F>(name: &'static str, handle: Handle, serve: F) -> Result<Self, ServerError>
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let mut task = tokio::spawn(serve);

        // The serve task may fail before `listening` is polled, so race both
        let bound = tokio::select! {
            addr = handle.listening() => addr,
            result = &mut task => return Err(bind_error(name, result)),
        };

        match bound {
            Some(addr) => {
                info!(listener = name, %addr, "Listener bound");
                Ok(Self {
                    name,
                    addr,
                    handle,
                    task: Some(task),
                })
            }
            None => Err(bind_error(name, task.await)),
        }
    }

    /// Resolve when the serve task ends
    async fn stopped(&mut self) -> Result<(), ServerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        join_result(self.name, result)
    }
}

fn bind_error(
    listener: &'static str,
    result: Result<io::Result<()>, JoinError>,
) -> ServerError {
    let source = match result {
        Ok(Err(e)) => e,
        Ok(Ok(())) => io::Error::other("listener exited before binding"),
        Err(e) => io::Error::other(e.to_string()),
    };
    ServerError::Bind { listener, source }
}

fn join_result(
    listener: &'static str,
    result: Result<io::Result<()>, JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ServerError::Serve { listener, source }),
        Err(e) => Err(ServerError::Aborted {
            listener,
            message: e.to_string(),
        }),
    }
}

/// Owner of the running listeners, returned by [`start`]
pub struct ServerHandle {
    plaintext: Listener,
    tls: Option<Listener>,
}

impl ServerHandle {
    /// Bound address of the plaintext listener
    pub fn plaintext_addr(&self) -> SocketAddr {
        self.plaintext.addr
    }

    /// Bound address of the TLS listener, if it was started
    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls.as_ref().map(|l| l.addr)
    }

    /// Resolve as soon as either listener stops.
    ///
    /// Listeners only stop on their own when serving fails, so callers
    /// should treat any return as fatal rather than keep the survivor.
    pub async fn wait(&mut self) -> Result<(), ServerError> {
        let Self { plaintext, tls } = self;
        match tls {
            Some(tls) => {
                tokio::select! {
                    result = plaintext.stopped() => result,
                    result = tls.stopped() => result,
                }
            }
            None => plaintext.stopped().await,
        }
    }

    /// Stop both listeners, letting in-flight reviews finish within `grace`
    /// (`None` waits for all of them), and release their ports.
    pub async fn shutdown(mut self, grace: Option<Duration>) -> Result<(), ServerError> {
        info!(grace_secs = grace.map(|g| g.as_secs()), "Shutting down listeners");

        self.plaintext.handle.graceful_shutdown(grace);
        if let Some(tls) = &self.tls {
            tls.handle.graceful_shutdown(grace);
        }

        let plaintext = self.plaintext.stopped().await;
        let tls = match self.tls.as_mut() {
            Some(tls) => tls.stopped().await,
            None => Ok(()),
        };

        info!("Listeners stopped");
        plaintext.and(tls)
    }
}

/// Bind the listeners described by `config` and serve `app` on each.
///
/// Fails if either listener cannot bind, or if the certificate exists but
/// the certificate/key pair cannot be loaded.
pub async fn start(config: &Config, app: Router) -> Result<ServerHandle, ServerError> {
    let tls_config = if config.cert_file.exists() {
        let tls_config = RustlsConfig::from_pem_file(&config.cert_file, &config.key_file)
            .await
            .map_err(|e| ServerError::TlsConfig(e.to_string()))?;
        Some(tls_config)
    } else {
        warn!(
            cert_file = %config.cert_file.display(),
            "No certificate found, TLS listener disabled"
        );
        None
    };

    let plaintext = {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
        info!(port = config.http_port, "Starting plaintext listener");
        let handle = Handle::new();
        let serve = axum_server::bind(addr)
            .handle(handle.clone())
            .serve(app.clone().into_make_service());
        Listener::launch(PLAINTEXT, handle, serve).await?
    };

    let tls = match tls_config {
        Some(tls_config) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.https_port));
            info!(port = config.https_port, "Starting TLS listener");
            let handle = Handle::new();
            let serve = axum_server::bind_rustls(addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service());
            match Listener::launch(TLS, handle, serve).await {
                Ok(listener) => Some(listener),
                Err(e) => {
                    let mut plaintext = plaintext;
                    plaintext.handle.shutdown();
                    let _ = plaintext.stopped().await;
                    return Err(e);
                }
            }
        }
        None => None,
    };

    Ok(ServerHandle { plaintext, tls })
}
