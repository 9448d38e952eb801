//! One inbound request against one target: build, send, relay.

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::Response;
use hyper::body::Incoming;

use super::error_response;
use super::relay::RelayBody;
use crate::client::OutboundClient;
use crate::error::ForwardError;

pub async fn forward(client: &OutboundClient, target: &str, inbound: Request<Body>) -> Response {
    let (parts, body) = inbound.into_parts();

    let outbound = match build_outbound(target, &parts.method, &parts.uri, &parts.headers, body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(target_host = %target, path = %parts.uri.path(), error = %e, "error creating request");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error creating request");
        }
    };

    let upstream = match client.send(outbound).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(target_host = %target, path = %parts.uri.path(), error = %e, "error forwarding request");
            return error_response(e.status(), "Error forwarding request");
        }
    };

    tracing::debug!(
        target_host = %target,
        path = %parts.uri.path(),
        status = upstream.status().as_u16(),
        "backend responded"
    );

    relay_response(upstream, client.timeouts().body_read, target)
}

/// `http://<target><path>` with the inbound method, headers and body.
///
/// The query string is not carried over. Headers are copied as-is,
/// hop-by-hop ones included; only `Host` is replaced so it names the
/// backend instead of this proxy.
pub fn build_outbound(
    target: &str,
    method: &Method,
    inbound_uri: &Uri,
    headers: &HeaderMap,
    body: Body,
) -> Result<Request<Body>, ForwardError> {
    let uri = Uri::try_from(format!("http://{target}{}", inbound_uri.path()))
        .map_err(http::Error::from)?;
    let host = uri
        .authority()
        .map(|a| HeaderValue::from_str(a.as_str()))
        .transpose()
        .map_err(http::Error::from)?;

    let mut req = Request::builder()
        .method(method.clone())
        .uri(uri)
        .body(body)?;

    *req.headers_mut() = headers.clone();
    if let Some(host) = host {
        req.headers_mut().insert(HOST, host);
    }
    Ok(req)
}

/// Turn a backend response into the inbound response, body streamed.
pub fn relay_response(
    upstream: hyper::Response<Incoming>,
    read_timeout: std::time::Duration,
    target: &str,
) -> Response {
    let (parts, body) = upstream.into_parts();
    let mut response = Response::new(Body::new(RelayBody::new(body, read_timeout, target)));

    // Headers before status: the status line finalizes the head.
    *response.headers_mut() = parts.headers;
    *response.status_mut() = parts.status;
    response
}
