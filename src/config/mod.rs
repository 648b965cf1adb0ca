//! Configuration management for FHIR Bridge.
//!
//! # Overview
//!
//! FHIR Bridge uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `FHIR_BRIDGE_*` environment overrides
//! - Default values for every optional setting
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`ConversionConfig`] - Per-input-type converter settings (render timeout)
//! - [`RegistryServerConfig`] - Template registries and their credentials
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [conversion.hl7v2]
//! render_timeout_ms = 10000
//!
//! [[registries]]
//! server = "contoso.azurecr.io"
//! auth_type = "azure_ad"
//! tenant_id = "00000000-0000-0000-0000-000000000001"
//! client_id = "00000000-0000-0000-0000-000000000002"
//! client_secret = "${FHIR_BRIDGE_ACR_CLIENT_SECRET}"
//! ```
//!
//! # Validation
//!
//! ```rust,no_run
//! use fhir_bridge::config::load_config;
//!
//! match load_config("fhir-bridge.toml") {
//!     Ok(_) => println!("Configuration valid"),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, BridgeConfig, ConversionConfig, Environment, LoggingConfig,
    ProcessorConfig, RegistryAuthType, RegistryServerConfig, RetryConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
