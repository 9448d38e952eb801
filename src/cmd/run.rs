//! `portmux run`: start the proxy.
//!
//! Loads and validates the config, builds the single outbound client,
//! binds one listener per port and waits on all of them. A config or
//! listener failure ends the process; Ctrl+C / SIGTERM stops every
//! listener gracefully.

use std::net::IpAddr;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::client::{OutboundClient, Timeouts};
use crate::config;
use crate::error::PortmuxError;
use crate::logging;
use crate::server::{self, ServeOptions, Supervisor};

pub async fn execute(args: RunArgs) -> Result<(), PortmuxError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let config = config::load(&args.config).await?;

    let host: IpAddr = args
        .host
        .parse()
        .map_err(|source| PortmuxError::ListenAddress {
            addr: args.host.clone(),
            source,
        })?;
    let limit = Duration::from_secs(args.timeout_secs);

    let client = OutboundClient::from_env(Timeouts::uniform(limit))?;
    let supervisor = Supervisor::new(client, ServeOptions::uniform(host, limit));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let listeners = supervisor.start(&config, shutdown_rx).await?;

    tracing::info!(
        config = %args.config.display(),
        ports = config.ports.len(),
        routes = config.total_routes(),
        "portmux started"
    );

    tokio::spawn(async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    listeners.wait().await?;

    tracing::info!("portmux stopped");
    Ok(())
}
