//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, validate), and their argument structs. Flags used
//! in deployments have an environment variable equivalent.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::client::TIME_LIMIT_SECS;

#[derive(Parser)]
#[command(
    name = "portmux",
    version,
    about = "Multi-port HTTP reverse proxy",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        portmux run                          Start with ./config.json\n  \
        portmux run -c routes.json           Start with a specific config\n  \
        portmux validate routes.json         Check a config without starting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start one listener per configured port
    Run(RunArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        portmux run                                     Use ./config.json\n  \
        portmux run -c routes.json --pretty             Local dev mode\n  \
        portmux run -c routes.json --host 127.0.0.1     Loopback only")]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.json")]
    pub config: PathBuf,

    /// Address every port listens on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Bound in seconds for each network phase (dial, handshake,
    /// response headers, idle connections, body reads)
    #[arg(
        long,
        env = "TIMEOUT_SECS",
        default_value_t = TIME_LIMIT_SECS,
        value_parser = clap::value_parser!(u64).range(1..),
        help_heading = "Tuning"
    )]
    pub timeout_secs: u64,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "config.json")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
