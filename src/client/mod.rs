//! The process-wide outbound HTTP client.
//!
//! [`OutboundClient`] is built once at startup and cloned (a cheap
//! refcount bump) into every port's state. It wraps a pooled hyper
//! client whose connector stacks plain TCP, permissive TLS and
//! environment proxy selection. Submodules hold the TLS verifier
//! ([`tls`]) and the proxy-aware connector ([`proxy`]).

pub mod proxy;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use http::header::PROXY_AUTHORIZATION;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::error::{ForwardError, PortmuxError};
use proxy::{ProxyConnector, ProxyRules};

/// Default bound for every network phase, in seconds.
pub const TIME_LIMIT_SECS: u64 = 100;

/// Idle pooled connections kept per backend. hyper-util has no global
/// cap, so the pool holds at most this many per distinct target.
pub const MAX_IDLE_PER_HOST: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub tls_handshake: Duration,
    pub keepalive: Duration,
    pub idle: Duration,
    pub response_header: Duration,
    pub request: Duration,
    /// Longest wait for the next piece of a backend body.
    pub body_read: Duration,
}

impl Timeouts {
    /// The same bound for every phase.
    #[must_use]
    pub const fn uniform(limit: Duration) -> Self {
        Self {
            connect: limit,
            tls_handshake: limit,
            keepalive: limit,
            idle: limit,
            response_header: limit,
            request: limit,
            body_read: limit,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(TIME_LIMIT_SECS))
    }
}

pub type UpstreamConnector =
    ProxyConnector<hyper_rustls::HttpsConnector<HttpConnector>>;

#[derive(Clone)]
pub struct OutboundClient {
    inner: Client<UpstreamConnector, Body>,
    proxies: Arc<ProxyRules>,
    timeouts: Timeouts,
}

impl std::fmt::Debug for OutboundClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundClient")
            .field("proxies", &self.proxies)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl OutboundClient {
    /// Client honoring proxy settings from the environment.
    pub fn from_env(timeouts: Timeouts) -> Result<Self, PortmuxError> {
        Self::with_proxy_rules(timeouts, ProxyRules::from_env())
    }

    pub fn with_proxy_rules(timeouts: Timeouts, rules: ProxyRules) -> Result<Self, PortmuxError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(timeouts.connect));
        http.set_keepalive(Some(timeouts.keepalive));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls::permissive_client_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let proxies = Arc::new(rules);
        let connector = ProxyConnector::new(
            https,
            Arc::clone(&proxies),
            timeouts.connect + timeouts.tls_handshake,
        );

        let inner = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(timeouts.idle)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build(connector);

        Ok(Self {
            inner,
            proxies,
            timeouts,
        })
    }

    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Send a fully formed request. Resolves once the response head has
    /// arrived; the body is left unread for the caller to stream.
    pub async fn send(&self, mut req: Request<Body>) -> Result<Response<Incoming>, ForwardError> {
        if let Some(intercept) = self.proxies.intercept(req.uri()) {
            if let Some(auth) = intercept.basic_auth() {
                req.headers_mut().insert(PROXY_AUTHORIZATION, auth.clone());
            }
        }

        let limit = self.timeouts.response_header.min(self.timeouts.request);
        match tokio::time::timeout(limit, self.inner.request(req)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ForwardError::Timeout(limit)),
        }
    }
}
