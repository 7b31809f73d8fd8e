//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//! Any [`Signal`](crate::shutdown::Signal) on the shutdown channel, whether
//! forwarded from the OS or raised by the pipeline, starts the same sequence:
//!
//! 1. Stop calling `listener.accept()`; no new connections are made.
//! 2. Tell every open connection to finish its in-flight request and close.
//! 3. Wait up to the shutdown timeout for them, then abort the stragglers.
//!
//! A failing listener drains the same way before [`Server::serve`] returns
//! the error. Keep the shutdown timeout below the pod's grace period.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::{Error, ServerError};
use crate::response::Response;
use crate::shutdown::ShutdownReceiver;

/// Default upper bound on draining in-flight requests.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    shutdown_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr, shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT }
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Binds, then serves `app` until a signal arrives on `shutdown`.
    pub async fn serve(self, app: App, shutdown: ShutdownReceiver) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind { addr: self.addr, source })?;
        self.serve_listener(listener, app, shutdown).await
    }

    /// Serves `app` on an already bound listener.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        app: App,
        mut shutdown: ShutdownReceiver,
    ) -> Result<(), ServerError> {
        // Shared across every connection task without copying the route table.
        let app = Arc::new(app);

        // Flipped to `true` once to ask open connections to wind down.
        let (drain_tx, drain_rx) = watch::channel(false);

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = JoinSet::new();

        match listener.local_addr() {
            Ok(addr) => info!(%addr, "listening"),
            Err(e) => warn!(error = %e, "listening on unknown address"),
        }

        let outcome = loop {
            tokio::select! {
                // Shutdown is checked first so a signal immediately stops
                // accepting new connections, even if more are queued.
                biased;

                sig = shutdown.recv() => {
                    match sig {
                        Some(sig) => info!(signal = %sig, in_flight = tasks.len(), "shutdown started"),
                        None => info!(in_flight = tasks.len(), "shutdown channel closed"),
                    }
                    break Ok(());
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!(error = %e, in_flight = tasks.len(), "listener failed, shutting down");
                            break Err(ServerError::Listener(e));
                        }
                    };

                    let app = Arc::clone(&app);
                    let mut drain = drain_rx.clone();

                    tasks.spawn(async move {
                        // Called once per request on the connection, not
                        // once per connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { serve_request(&app, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(TokioIo::new(stream), svc);
                        tokio::pin!(conn);

                        let res = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = drain.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.as_mut().await
                            }
                        };

                        if let Err(e) = res {
                            debug!(peer = %remote_addr, error = %e, "connection closed with error");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        drain_tx.send_replace(true);

        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            error!(
                timeout = ?self.shutdown_timeout,
                aborted = tasks.len(),
                "in-flight requests did not drain in time"
            );
            tasks.abort_all();
            return Err(ServerError::ShutdownTimeout(self.shutdown_timeout));
        }

        info!("server stopped");
        outcome
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the body and runs one request through the pipeline.
///
/// An `Err` here is an escalated pipeline error: hyper drops the connection
/// without a response.
async fn serve_request(
    app: &App,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Error> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, error = %e, "unable to read request body");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let response = app.call(http::Request::from_parts(parts, body), remote_addr).await?;
    Ok(response.into_inner())
}
