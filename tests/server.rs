//! Integration tests for forwarding through a single proxied port.

mod common;

use std::time::Duration;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Router;
use hyper_util::client::proxy::matcher::Matcher;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::{
    closed_port, http, read_until, recording_backend, route, spawn_app, start_proxy,
};
use portmux::client::proxy::ProxyRules;
use portmux::client::{OutboundClient, Timeouts};

#[tokio::test]
async fn round_trip_preserves_status_headers_and_body() {
    let (backend, _log) = recording_backend().await;
    let proxy = start_proxy(&[route("GET", "/echo", &backend.to_string())]).await;

    let resp = http()
        .get(format!("http://{proxy}/echo"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-test"], "1");
    assert_eq!(resp.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn forwards_method_path_headers_and_body() {
    let (backend, log) = recording_backend().await;
    let proxy = start_proxy(&[route("POST", "/orders", &backend.to_string())]).await;

    let resp = http()
        .post(format!("http://{proxy}/orders"))
        .header("x-custom", "abc")
        .header("authorization", "Bearer token")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let req = &seen[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.uri.path(), "/orders");
    assert_eq!(req.headers["x-custom"], "abc");
    assert_eq!(req.headers["authorization"], "Bearer token");
    assert_eq!(req.headers["host"], backend.to_string().as_str());
    assert_eq!(req.body, "payload");
}

#[tokio::test]
async fn query_string_is_not_forwarded() {
    let (backend, log) = recording_backend().await;
    let proxy = start_proxy(&[route("GET", "/items", &backend.to_string())]).await;

    let resp = http()
        .get(format!("http://{proxy}/items?page=2&sort=asc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let seen = log.lock().unwrap().clone();
    assert_eq!(seen[0].uri.path(), "/items");
    assert_eq!(seen[0].uri.query(), None);
}

#[tokio::test]
async fn method_mismatch_returns_405_without_upstream_call() {
    let (backend, log) = recording_backend().await;
    let proxy = start_proxy(&[route("POST", "/orders", &backend.to_string())]).await;

    let resp = http()
        .get(format!("http://{proxy}/orders"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.text().await.unwrap(), "Method not allowed\n");
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unregistered_path_returns_404_without_upstream_call() {
    let (backend, log) = recording_backend().await;
    let proxy = start_proxy(&[route("GET", "/users", &backend.to_string())]).await;

    for path in ["/nonexistent", "/users/42", "/users/", "/"] {
        let resp = http()
            .get(format!("http://{proxy}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "path {path}");
    }
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn backend_status_and_headers_pass_through() {
    let backend = spawn_app(Router::new().fallback(|| async {
        (
            StatusCode::CREATED,
            [("x-backend", "orders"), ("cache-control", "no-store")],
            "created",
        )
    }))
    .await;
    let proxy = start_proxy(&[route("PUT", "/orders", &backend.to_string())]).await;

    let resp = http()
        .put(format!("http://{proxy}/orders"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["x-backend"], "orders");
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert_eq!(resp.text().await.unwrap(), "created");
}

#[tokio::test]
async fn unreachable_backend_returns_502_and_listener_survives() {
    let dead = format!("127.0.0.1:{}", closed_port().await);
    let (backend, _log) = recording_backend().await;
    let proxy = start_proxy(&[
        route("GET", "/dead", &dead),
        route("GET", "/alive", &backend.to_string()),
    ])
    .await;

    let resp = http()
        .get(format!("http://{proxy}/dead"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = resp.text().await.unwrap();
    assert_eq!(body, "Error forwarding request\n");

    let resp = http()
        .get(format!("http://{proxy}/alive"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn malformed_target_returns_500() {
    let proxy = start_proxy(&[route("GET", "/broken", "bad host")]).await;

    let resp = http()
        .get(format!("http://{proxy}/broken"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.text().await.unwrap(), "Error creating request\n");
}

#[tokio::test]
async fn large_body_arrives_intact() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let served = payload.clone();
    let backend = spawn_app(Router::new().fallback(move || {
        let served = served.clone();
        async move { served.into_response() }
    }))
    .await;
    let proxy = start_proxy(&[route("GET", "/blob", &backend.to_string())]).await;

    let resp = http()
        .get(format!("http://{proxy}/blob"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), payload.as_slice());
}

#[tokio::test]
async fn body_is_streamed_before_backend_finishes() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend.local_addr().unwrap();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    // Raw backend: first chunk, wait for the test, second chunk, end.
    tokio::spawn(async move {
        let (mut conn, _) = backend.accept().await.unwrap();
        let mut head = Vec::new();
        read_until(&mut conn, &mut head, b"\r\n\r\n").await;
        conn.write_all(
            b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\nx-stream: yes\r\n\r\n8\r\npart-one\r\n",
        )
        .await
        .unwrap();
        conn.flush().await.unwrap();
        release_rx.await.unwrap();
        conn.write_all(b"8\r\npart-two\r\n0\r\n\r\n").await.unwrap();
        conn.flush().await.unwrap();
    });

    let proxy = start_proxy(&[route("GET", "/stream", &backend_addr.to_string())]).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"GET /stream HTTP/1.1\r\nhost: proxy\r\nconnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut seen = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        read_until(&mut client, &mut seen, b"part-one"),
    )
    .await
    .expect("first chunk was held back until the backend finished");

    let text = String::from_utf8_lossy(&seen).to_string();
    assert!(text.starts_with("HTTP/1.1 200"));
    assert!(text.to_ascii_lowercase().contains("x-stream: yes"));
    assert!(!text.contains("part-two"));

    release_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut seen))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&seen);
    assert!(text.contains("part-two"));
}

#[tokio::test]
async fn truncated_backend_body_does_not_stop_the_listener() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = backend.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut conn, _) = backend.accept().await.unwrap();
        let mut head = Vec::new();
        read_until(&mut conn, &mut head, b"\r\n\r\n").await;
        // Promise 100 bytes, send 5, hang up.
        conn.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nhello")
            .await
            .unwrap();
    });
    let (alive, _log) = recording_backend().await;
    let proxy = start_proxy(&[
        route("GET", "/cut", &backend_addr.to_string()),
        route("GET", "/alive", &alive.to_string()),
    ])
    .await;

    let resp = http()
        .get(format!("http://{proxy}/cut"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await.is_err());

    let resp = http()
        .get(format!("http://{proxy}/alive"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn plain_http_goes_through_configured_proxy() {
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = std::sync::Arc::clone(&seen);
    let forward_proxy = spawn_app(Router::new().fallback(move |req: Request| {
        let recorder = std::sync::Arc::clone(&recorder);
        async move {
            let auth = req
                .headers()
                .get("proxy-authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            recorder.lock().unwrap().push((req.uri().clone(), auth));
            "via proxy".into_response()
        }
    }))
    .await;

    let matcher = Matcher::builder()
        .http(format!("http://user:secret@{forward_proxy}"))
        .build();
    let client = OutboundClient::with_proxy_rules(
        Timeouts::uniform(Duration::from_secs(5)),
        ProxyRules::from_matcher(matcher),
    )
    .unwrap();
    let proxy =
        common::start_proxy_with(&[route("GET", "/remote", "backend.invalid:8000")], client).await;

    let resp = http()
        .get(format!("http://{proxy}/remote"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "via proxy");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (uri, auth) = &seen[0];
    assert_eq!(uri.host(), Some("backend.invalid"));
    assert_eq!(uri.port_u16(), Some(8000));
    assert_eq!(uri.path(), "/remote");
    assert_eq!(auth.as_deref(), Some("Basic dXNlcjpzZWNyZXQ="));
}
