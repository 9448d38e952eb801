//! Configuration loading and validation.
//!
//! The route table is read once at startup from a JSON file, validated,
//! and then shared read-only for the lifetime of the process. Submodules
//! provide the data model and the validation rules.

pub mod model;
pub mod validation;

use std::path::Path;

use crate::error::PortmuxError;
use model::Config;

/// Parse a config document. `path` is only used for error messages.
pub fn parse_config_str(content: &str, path: &Path) -> Result<Config, PortmuxError> {
    serde_json::from_str(content).map_err(|e| PortmuxError::ConfigParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read, parse and validate the config file at `path`.
pub async fn load(path: &Path) -> Result<Config, PortmuxError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PortmuxError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PortmuxError::ConfigRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let config = parse_config_str(&content, path)?;

    if let Err(errors) = validation::validate(&config) {
        return Err(PortmuxError::ConfigValidation { errors });
    }

    Ok(config)
}
