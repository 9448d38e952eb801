//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: non-positive or out-of-range ports, duplicate ports, missing
//! gateways, incomplete routes, non-absolute paths and duplicate paths
//! on the same port. Every finding is collected so the operator sees
//! all of them at once.

use std::collections::HashSet;

use super::model::{Config, PortSpec};
use crate::error::ValidationError;

/// Validate a single route path. Returns `Ok(())` or a human-readable error.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("path must start with '/' (did you mean '/{path}'?)"));
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen_ports = HashSet::new();

    for (i, port) in config.ports.iter().enumerate() {
        let location = port_location(i, port);

        if port.port <= 0 {
            errors.push(ValidationError {
                location: location.clone(),
                field: "port".into(),
                message: format!("invalid port number: {}", port.port),
                suggestion: None,
            });
        } else if port.listen_port().is_none() {
            errors.push(ValidationError {
                location: location.clone(),
                field: "port".into(),
                message: format!("port {} is out of range", port.port),
                suggestion: Some("ports go up to 65535".into()),
            });
        } else if !seen_ports.insert(port.port) {
            errors.push(ValidationError {
                location: location.clone(),
                field: "port".into(),
                message: "duplicate port".into(),
                suggestion: None,
            });
        }

        if port.gateway.is_empty() {
            errors.push(ValidationError {
                location: location.clone(),
                field: "gateway".into(),
                message: format!("missing gateway for port {}", port.port),
                suggestion: None,
            });
        }

        let mut seen_paths = HashSet::new();
        for (j, route) in port.routes.iter().enumerate() {
            let route_location = format!("{location} routes[{j}]");

            for (field, value) in [
                ("method", &route.method),
                ("path", &route.path),
                ("target", &route.target),
            ] {
                if value.is_empty() {
                    errors.push(ValidationError {
                        location: route_location.clone(),
                        field: field.into(),
                        message: format!("invalid route entry in port {}", port.port),
                        suggestion: Some(format!("{field} cannot be empty")),
                    });
                }
            }

            if !route.path.is_empty() {
                if let Err(msg) = validate_path(&route.path) {
                    errors.push(ValidationError {
                        location: route_location.clone(),
                        field: "path".into(),
                        message: msg,
                        suggestion: None,
                    });
                }
                if !seen_paths.insert(route.path.as_str()) {
                    errors.push(ValidationError {
                        location: route_location,
                        field: "path".into(),
                        message: format!("duplicate route path '{}'", route.path),
                        suggestion: Some("each path is registered once per port".into()),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn port_location(index: usize, port: &PortSpec) -> String {
    if port.port > 0 {
        format!("port {}", port.port)
    } else {
        format!("ports[{index}]")
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} ports, {} routes\n",
        config.ports.len(),
        config.total_routes()
    )];

    for port in &config.ports {
        lines.push(format!("  :{}  (gateway {})", port.port, port.gateway));
        for route in &port.routes {
            lines.push(format!(
                "    {} {}  -> {}",
                route.method, route.path, route.target
            ));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
