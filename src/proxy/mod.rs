//! Core HTTP forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback for every
//! request on a port. It looks the path up in the port's route table,
//! answers 404 / 405 itself, and hands matches to the forwarder.
//! Submodules handle route lookup ([`routing`]), building and sending
//! the outbound request ([`forward`]) and streaming the backend body
//! back ([`relay`]).

pub mod forward;
pub mod relay;
pub mod routing;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::client::OutboundClient;
use routing::{Dispatch, RouteTable};

/// Shared state of one listening port.
#[derive(Debug)]
pub struct PortState {
    pub port: u16,
    pub routes: RouteTable,
    pub client: OutboundClient,
}

pub async fn forward_handler(State(state): State<Arc<PortState>>, req: Request) -> Response {
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    let target = match state.routes.dispatch(method.as_str(), &path) {
        Dispatch::NotFound => {
            tracing::debug!(port = state.port, method = %method, path = %path, "no route matched");
            return StatusCode::NOT_FOUND.into_response();
        }
        Dispatch::MethodNotAllowed { allowed } => {
            tracing::info!(
                port = state.port,
                method = %method,
                path = %path,
                allowed = %allowed,
                "method not allowed"
            );
            return error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        }
        Dispatch::Forward(route) => route.target.clone(),
    };

    tracing::info!(
        port = state.port,
        method = %method,
        path = %path,
        target_host = %target,
        "request received"
    );

    forward::forward(&state.client, &target, req).await
}

/// Plain-text error response with a generic message.
#[must_use]
pub fn error_response(status: StatusCode, message: &str) -> Response {
    let mut response = (status, format!("{message}\n")).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}
