//! portmux is a multi-port HTTP reverse proxy.
//!
//! It reads a JSON route table, opens one listener per configured port,
//! and forwards each request whose exact path and method match a route
//! to that route's backend. The backend's status and headers are passed
//! back verbatim and its body is streamed to the client as it arrives.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate).
//! - [`config`] -- JSON config model, loading and validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`client`] -- The single pooled outbound client: timeouts, permissive
//!   upstream TLS and environment proxy support.
//! - [`proxy`] -- Per-port route lookup, request forwarding and the
//!   streaming response relay.
//! - [`server`] -- Per-port accept loops, the listener supervisor and
//!   graceful shutdown.
//! - [`conn`] -- Inbound connection wrapper bounding stalled writes.

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod client;
pub mod cmd;
pub mod config;
pub mod conn;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
