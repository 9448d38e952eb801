//! Environment proxy support for outbound connections.
//!
//! [`ProxyRules`] decides, per destination, whether a connection should
//! go through a proxy taken from `HTTP_PROXY` / `ALL_PROXY` / `NO_PROXY`
//! (and lowercase variants). [`ProxyConnector`] wraps the TCP/TLS
//! connector: intercepted destinations are dialed at the proxy address
//! and the resulting connection is marked as proxied, which makes the
//! pooled client send requests to it in absolute-form.
//!
//! Only plain-HTTP destinations are intercepted. Upstream requests are
//! always built with the `http` scheme, so CONNECT tunnelling is never
//! needed.

use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::uri::Scheme;
use http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::client::proxy::matcher::{Intercept, Matcher};
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct ProxyRules {
    matcher: Option<Matcher>,
}

impl ProxyRules {
    /// Rules read from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            matcher: Some(Matcher::from_env()),
        }
    }

    /// Always connect directly.
    #[must_use]
    pub const fn none() -> Self {
        Self { matcher: None }
    }

    #[must_use]
    pub const fn from_matcher(matcher: Matcher) -> Self {
        Self {
            matcher: Some(matcher),
        }
    }

    /// The proxy to use for `dst`, if any. Loopback destinations and
    /// non-HTTP schemes always connect directly.
    #[must_use]
    pub fn intercept(&self, dst: &Uri) -> Option<Intercept> {
        if dst.scheme() != Some(&Scheme::HTTP) || is_loopback(dst) {
            return None;
        }
        self.matcher.as_ref()?.intercept(dst)
    }
}

impl std::fmt::Debug for ProxyRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRules")
            .field("enabled", &self.matcher.is_some())
            .finish()
    }
}

fn is_loopback(uri: &Uri) -> bool {
    let Some(host) = uri.host() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost") || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// Connector that dials the configured proxy instead of the destination
/// when [`ProxyRules`] intercepts it. Connection establishment (dial and
/// any TLS handshake) is bounded by `establish_timeout`.
#[derive(Clone)]
pub struct ProxyConnector<C> {
    inner: C,
    rules: Arc<ProxyRules>,
    establish_timeout: Duration,
}

impl<C> ProxyConnector<C> {
    pub const fn new(inner: C, rules: Arc<ProxyRules>, establish_timeout: Duration) -> Self {
        Self {
            inner,
            rules,
            establish_timeout,
        }
    }
}

impl<C> Service<Uri> for ProxyConnector<C>
where
    C: Service<Uri>,
    C::Error: Into<BoxError>,
    C::Future: Send + 'static,
{
    type Response = ProxyStream<C::Response>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let (connect_to, via_proxy) = match self.rules.intercept(&dst) {
            Some(intercept) => {
                tracing::debug!(destination = %dst, proxy = %intercept.uri(), "connecting through proxy");
                (intercept.uri().clone(), true)
            }
            None => (dst, false),
        };

        let connecting = self.inner.call(connect_to);
        let limit = self.establish_timeout;
        Box::pin(async move {
            match tokio::time::timeout(limit, connecting).await {
                Ok(Ok(inner)) => Ok(ProxyStream { inner, via_proxy }),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(Box::new(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection not established within {limit:?}"),
                )) as BoxError),
            }
        })
    }
}

/// An upstream connection, flagged when it leads to a proxy.
#[derive(Debug)]
pub struct ProxyStream<T> {
    inner: T,
    via_proxy: bool,
}

impl<T: Connection> Connection for ProxyStream<T> {
    fn connected(&self) -> Connected {
        let connected = self.inner.connected();
        if self.via_proxy {
            connected.proxy(true)
        } else {
            connected
        }
    }
}

impl<T: Read + Unpin> Read for ProxyStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: Write + Unpin> Write for ProxyStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }
}
