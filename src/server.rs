//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** (Kubernetes, systemd) or **SIGINT** (Ctrl-C) the server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Tells every open connection to close once its in-flight request is
//!    answered. Idle keep-alive connections close right away.
//! 3. Waits up to [`DRAIN_TIMEOUT`] for them, aborts whatever is left, then
//!    returns from [`Server::serve`] so `main` can exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::app::Dispatcher;
use crate::config::Config;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// How long shutdown waits for open connections before aborting them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Binds to the config's `listen` address (default `127.0.0.1:3000`).
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self::bind(config.listen()?))
    }

    /// Serves `dispatcher` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), Error> {
        self.serve_with_shutdown(dispatcher, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), stopping when `signal` resolves instead.
    pub async fn serve_with_shutdown(
        self,
        dispatcher: Dispatcher,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let dispatcher = Arc::new(dispatcher);

        info!(addr = %self.addr, "keel listening");

        let conn_builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting even when
                // connections are queued.
                biased;

                () = &mut signal => {
                    info!(open = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = Arc::clone(&dispatcher);

                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { handle(dispatcher, req, remote_addr).await }
                    });
                    let conn = conn_builder.serve_connection(TokioIo::new(stream), svc).into_owned();
                    let conn = graceful.watch(conn);

                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);

        tokio::select! {
            () = graceful.shutdown() => {}
            () = tokio::time::sleep(DRAIN_TIMEOUT) => {
                warn!(open = tasks.len(), "drain timed out, aborting open connections");
                tasks.abort_all();
            }
        }
        while tasks.join_next().await.is_some() {}

        info!("keel stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Buffers one request, runs it through the dispatcher and converts the
/// result for hyper. Every failure is answered with a status code, so hyper
/// never sees an error.
async fn handle(
    dispatcher: Arc<Dispatcher>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let span = info_span!("request", method = %req.method(), path = %req.uri().path());

    let response = async move {
        let started = Instant::now();
        let (mut parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(peer = %remote_addr, "failed to read request body: {e}");
                return Response::status(StatusCode::BAD_REQUEST);
            }
        };
        parts.extensions.insert(remote_addr);

        let request = Request::from_http(http::Request::from_parts(parts, body));
        let response = dispatcher.handle(request).await;
        debug!(
            status = response.status_code().as_u16(),
            latency_us = started.elapsed().as_micros() as u64,
            "request completed",
        );
        response
    }
    .instrument(span)
    .await;

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT. A signal handler that cannot be
/// installed is logged and that arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
