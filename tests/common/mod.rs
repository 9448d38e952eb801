//! Shared helpers for integration tests: recording backends, a single
//! port proxy on an ephemeral socket, and a proxy-free HTTP client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::IntoResponse;
use axum::Router;
use http_body_util::BodyExt;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use portmux::client::proxy::ProxyRules;
use portmux::client::{OutboundClient, Timeouts};
use portmux::config::model::RouteSpec;
use portmux::proxy::routing::RouteTable;
use portmux::proxy::PortState;
use portmux::server;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

pub fn route(method: &str, path: &str, target: &str) -> RouteSpec {
    RouteSpec {
        method: method.into(),
        path: path.into(),
        target: target.into(),
    }
}

pub fn test_client() -> OutboundClient {
    OutboundClient::with_proxy_rules(Timeouts::uniform(Duration::from_secs(5)), ProxyRules::none())
        .unwrap()
}

pub fn http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn_app(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Backend that records every request and answers
/// `200`, `X-Test: 1`, body `hello`.
pub async fn recording_backend() -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let recorder = Arc::clone(&log);
    let router = Router::new().fallback(move |req: Request| {
        let recorder = Arc::clone(&recorder);
        async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            recorder.lock().unwrap().push(Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            ([("x-test", "1")], "hello").into_response()
        }
    });
    (spawn_app(router).await, log)
}

/// A single proxied port with the given routes.
pub async fn start_proxy(routes: &[RouteSpec]) -> SocketAddr {
    start_proxy_with(routes, test_client()).await
}

pub async fn start_proxy_with(routes: &[RouteSpec], client: OutboundClient) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(PortState {
        port: addr.port(),
        routes: RouteTable::from_specs(routes),
        client,
    });
    let options = server::ServeOptions::uniform(addr.ip(), Duration::from_secs(5));
    let router = server::build_router(state, options.read_timeout);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        server::serve(listener, router, options, shutdown_rx).await;
        drop(shutdown_tx);
    });
    addr
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Read from `stream` until `needle` shows up in everything read so far.
pub async fn read_until(stream: &mut TcpStream, seen: &mut Vec<u8>, needle: &[u8]) {
    let mut buf = [0u8; 4096];
    while !seen.windows(needle.len()).any(|w| w == needle) {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before {:?}", String::from_utf8_lossy(needle));
        seen.extend_from_slice(&buf[..n]);
    }
}
