//! Per-port servers and their supervisor.
//!
//! [`build_router`] turns one port's state into an Axum router with
//! tracing and inbound body timeouts. [`serve`] runs the accept loop of
//! one port: every connection is served by hyper's HTTP/1 server with a
//! header read timer (which also bounds idle keep-alive waits) and a
//! write stall bound. [`Supervisor::start`] binds one listener per
//! configured port and serves each on its own task; [`Listeners::wait`]
//! blocks until all of them stop and reports the first failure, which is
//! fatal for the whole process. [`shutdown_signal`] resolves on SIGTERM /
//! Ctrl+C.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::ServiceBuilder;
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::client::{OutboundClient, TIME_LIMIT_SECS};
use crate::config::model::Config;
use crate::conn::WriteTimeout;
use crate::error::PortmuxError;
use crate::proxy::{self, routing::RouteTable, PortState};

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeOptions {
    pub host: IpAddr,
    /// Bound on receiving a request head, and on each wait for the next
    /// piece of a request body.
    pub read_timeout: Duration,
    /// Longest a response write may make no progress.
    pub write_timeout: Duration,
    /// Longest a keep-alive connection may sit between requests.
    pub idle_timeout: Duration,
}

impl ServeOptions {
    /// Every listener bound uses `limit` for read, write and idle.
    #[must_use]
    pub const fn uniform(host: IpAddr, limit: Duration) -> Self {
        Self {
            host,
            read_timeout: limit,
            write_timeout: limit,
            idle_timeout: limit,
        }
    }
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self::uniform(
            IpAddr::from([0, 0, 0, 0]),
            Duration::from_secs(TIME_LIMIT_SECS),
        )
    }
}

pub fn build_router(state: Arc<PortState>, read_timeout: Duration) -> Router {
    Router::new()
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyTimeoutLayer::new(read_timeout)),
        )
        .with_state(state)
}

/// Accept connections on `listener` until `shutdown` fires, then wait
/// for open connections to finish their in-flight requests.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    options: ServeOptions,
    shutdown: watch::Receiver<bool>,
) {
    let mut http = http1::Builder::new();
    // hyper starts the header timer as soon as it waits for a request
    // head, so the same timer ends idle keep-alive connections.
    http.timer(TokioTimer::new())
        .header_read_timeout(options.read_timeout.min(options.idle_timeout))
        .keep_alive(true);

    let graceful = GracefulShutdown::new();

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            () = wait_for_shutdown(shutdown.clone()) => break,
        };

        let io = TokioIo::new(WriteTimeout::new(stream, options.write_timeout));
        let service = TowerToHyperService::new(router.clone());
        let conn = graceful.watch(http.serve_connection(io, service));
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(peer = %peer, error = %e, "connection ended with error");
            }
        });
    }

    drop(listener);
    graceful.shutdown().await;
}

pub struct Supervisor {
    client: OutboundClient,
    options: ServeOptions,
}

impl Supervisor {
    #[must_use]
    pub const fn new(client: OutboundClient, options: ServeOptions) -> Self {
        Self { client, options }
    }

    /// Bind every configured port, then serve each one on its own task.
    ///
    /// Fails on the first port that cannot be bound; nothing is served
    /// in that case. Listeners stop once `shutdown` turns `true` or its
    /// sender is dropped.
    pub async fn start(
        &self,
        config: &Config,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Listeners, PortmuxError> {
        let mut bound = Vec::with_capacity(config.ports.len());
        for spec in &config.ports {
            let port = spec
                .listen_port()
                .ok_or(PortmuxError::InvalidPort(spec.port))?;
            let listener = TcpListener::bind((self.options.host, port))
                .await
                .map_err(|source| PortmuxError::Bind { port, source })?;
            let state = Arc::new(PortState {
                port,
                routes: RouteTable::from_specs(&spec.routes),
                client: self.client.clone(),
            });
            bound.push((listener, state));
        }

        let mut tasks = JoinSet::new();
        let mut addrs = Vec::with_capacity(bound.len());
        for (listener, state) in bound {
            let port = state.port;
            let addr = listener.local_addr()?;
            addrs.push(addr);

            tracing::info!(port, addr = %addr, routes = state.routes.len(), "starting server");

            let router = build_router(state, self.options.read_timeout);
            let options = self.options;
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                serve(listener, router, options, shutdown).await;
                tracing::info!(port, "server stopped");
            });
        }

        Ok(Listeners { tasks, addrs })
    }
}

/// Running listeners, one per configured port.
pub struct Listeners {
    tasks: JoinSet<()>,
    addrs: Vec<SocketAddr>,
}

impl Listeners {
    /// Bound addresses, in config order.
    #[must_use]
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Wait for every listener to stop. The first failed listener task
    /// is returned immediately and the remaining listeners are aborted.
    pub async fn wait(mut self) -> Result<(), PortmuxError> {
        while let Some(joined) = self.tasks.join_next().await {
            joined.map_err(|source| PortmuxError::ListenerTask { source })?;
        }
        Ok(())
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender counts as a shutdown request.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
