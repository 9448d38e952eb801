//! `portmux validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::PortmuxError;

pub async fn execute(args: &ValidateArgs) -> Result<(), PortmuxError> {
    let path = &args.config;

    let config = match config::load(path).await {
        Ok(config) => config,
        Err(PortmuxError::ConfigValidation { errors }) => {
            match args.format {
                ValidateFormat::Text => {
                    eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                    for error in &errors {
                        eprintln!("{error}");
                    }
                }
                ValidateFormat::Json => {
                    let json_errors: Vec<serde_json::Value> = errors
                        .iter()
                        .map(|e| {
                            serde_json::json!({
                                "location": e.location,
                                "field": e.field,
                                "message": e.message,
                                "suggestion": e.suggestion,
                            })
                        })
                        .collect();
                    println!(
                        "{}",
                        serde_json::json!({
                            "valid": false,
                            "errors": json_errors,
                        })
                    );
                }
            }
            return Err(PortmuxError::ConfigValidation { errors });
        }
        Err(e) => return Err(e),
    };

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "ports": config.ports.len(),
                    "routes": config.total_routes(),
                })
            );
        }
    }

    Ok(())
}
