//! Serde data structures for the portmux configuration file.
//!
//! Contains [`Config`] (the root), [`PortSpec`] and [`RouteSpec`].
//! Fields default to their zero value when absent so that
//! [`validate`](super::validation::validate) can report them with a
//! descriptive message instead of a bare parse error.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

impl Config {
    #[must_use]
    pub fn total_routes(&self) -> usize {
        self.ports.iter().map(|p| p.routes.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortSpec {
    #[serde(default)]
    pub port: i64,

    /// Declared per port but never consulted when forwarding; each route
    /// carries its own target.
    #[serde(default)]
    pub gateway: String,

    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

impl PortSpec {
    /// The port as a socket port number, `None` when out of range.
    #[must_use]
    pub fn listen_port(&self) -> Option<u16> {
        u16::try_from(self.port).ok().filter(|p| *p > 0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteSpec {
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: String,

    /// `host[:port]` of the backend.
    #[serde(default)]
    pub target: String,
}
