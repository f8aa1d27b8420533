//! HTTP/1.1 transport.
//!
//! The server reads each request body completely (bounded by size and
//! time), converts it into a [`Request`], runs the [`Kernel`] on Tokio's
//! blocking pool and writes the resulting [`Response`] back.
//!
//! # Example
//!
//! ```rust,no_run
//! use mochi_config::ServerConfig;
//! use mochi_server::{Kernel, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kernel = Kernel::builder().build()?;
//!     Server::new(kernel, ServerConfig::default()).run().await?;
//!     Ok(())
//! }
//! ```

use crate::error::ServerError;
use crate::kernel::Kernel;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use mochi_config::ServerConfig;
use mochi_core::{Request, Response};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Serves a [`Kernel`] over HTTP/1.1.
#[derive(Debug)]
pub struct Server {
    kernel: Arc<Kernel>,
    config: ServerConfig,
}

impl Server {
    /// Creates a server.
    pub fn new(kernel: impl Into<Arc<Kernel>>, config: ServerConfig) -> Self {
        Self {
            kernel: kernel.into(),
            config,
        }
    }

    /// Returns the kernel.
    #[must_use]
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    /// Returns the transport configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` fires, then waits
    /// up to the shutdown timeout for open connections to finish.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.serve_connection(stream, remote, shutdown).await {
                                tracing::debug!(remote = %remote, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        tokio::select! {
            () = tracker.wait_idle() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |req: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle(req).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote = %remote, "closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle(&self, req: http::Request<Incoming>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();

        let limited = Limited::new(body, self.config.max_body_bytes);
        let collected = tokio::time::timeout(self.config.request_timeout(), limited.collect()).await;

        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::warn!(limit = self.config.max_body_bytes, "request body too large");
                return transport_error(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "PAYLOAD_TOO_LARGE",
                    "request body too large",
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read request body");
                return transport_error(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    "failed to read request body",
                );
            }
            Err(_) => {
                tracing::warn!("timed out reading request body");
                return transport_error(
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "timed out reading request body",
                );
            }
        };

        let request = Request::from_parts(parts, body);
        let kernel = Arc::clone(&self.kernel);
        let response = tokio::task::spawn_blocking(move || kernel.handle(&request))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "request handling panicked");
                Response::server_error()
            });

        response.into_http().map(Full::new)
    }
}

fn transport_error(status: StatusCode, code: &str, message: &str) -> http::Response<Full<Bytes>> {
    Response::json(status, &json!({"error": {"code": code, "message": message}}))
        .into_http()
        .map(Full::new)
}
