//! Unified error types for portmux.
//!
//! Defines [`PortmuxError`] (startup, configuration and listener
//! failures), [`ValidationError`] for config validation findings,
//! [`ForwardError`] for per-request failures that happen before the
//! response is committed, and [`RelayError`] for failures while the
//! backend body is being streamed. All use `thiserror` for `Display`
//! and `Error` derives.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.location, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PortmuxError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}:\n  {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Invalid listen address '{addr}': {source}")]
    ListenAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Error starting server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener task failed: {source}")]
    ListenerTask {
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("invalid port number: {0}")]
    InvalidPort(i64),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Failure before any part of the inbound response has been produced.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid outbound request: {0}")]
    InvalidRequest(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    Send(#[from] hyper_util::client::legacy::Error),

    #[error("no response headers within {0:?}")]
    Timeout(Duration),
}

impl ForwardError {
    /// Status returned to the inbound caller for this failure.
    #[must_use]
    pub const fn status(&self) -> http::StatusCode {
        match self {
            Self::InvalidRequest(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::Send(_) | Self::Timeout(_) => http::StatusCode::BAD_GATEWAY,
        }
    }
}

/// Failure after status and headers were handed to the server.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("backend body read failed: {0}")]
    Upstream(#[from] hyper::Error),

    #[error("backend body stalled for {0:?}")]
    ReadTimeout(Duration),
}
