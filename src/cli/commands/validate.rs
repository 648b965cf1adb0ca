//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the FHIR Bridge configuration file.

use super::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading runs validation
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Environment: {:?}", config.environment);
        println!(
            "  HL7v2 Render Timeout: {}ms",
            config.conversion.hl7v2.render_timeout_ms
        );
        println!(
            "  JSON Render Timeout: {}ms",
            config.conversion.json.render_timeout_ms
        );

        if config.registries.is_empty() {
            println!("  Registries: none (default collection only)");
        } else {
            println!("  Registries:");
            for registry in &config.registries {
                println!(
                    "    - {} ({:?}, tls_verify = {})",
                    registry.server, registry.auth_type, registry.tls_verify
                );
            }
        }

        if config.logging.local_enabled {
            println!(
                "  File Logging: {} ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        } else {
            println!("  File Logging: disabled");
        }

        Ok(EXIT_SUCCESS)
    }
}
