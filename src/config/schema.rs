//! Configuration schema types
//!
//! This module defines the configuration structure for FHIR Bridge.

use crate::config::SecretString;
use crate::core::convert::ProcessorSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a render timeout (10 minutes)
const MAX_RENDER_TIMEOUT_MS: u64 = 600_000;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Per-input-type converter settings
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Template registry servers and their credentials
    #[serde(default)]
    pub registries: Vec<RegistryServerConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.conversion.validate()?;

        let mut seen = std::collections::HashSet::new();
        for registry in &self.registries {
            registry.validate(&self.environment)?;
            if !seen.insert(registry.server.to_lowercase()) {
                return Err(format!(
                    "registries: server '{}' is configured more than once",
                    registry.server
                ));
            }
        }

        self.logging.validate()?;
        Ok(())
    }

    /// Finds the configuration for a registry server (case-insensitive)
    pub fn registry(&self, server: &str) -> Option<&RegistryServerConfig> {
        self.registries
            .iter()
            .find(|r| r.server.eq_ignore_ascii_case(server))
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Converter settings, one section per supported input type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// HL7v2 converter
    #[serde(default)]
    pub hl7v2: ProcessorConfig,

    /// JSON converter
    #[serde(default)]
    pub json: ProcessorConfig,
}

impl ConversionConfig {
    fn validate(&self) -> Result<(), String> {
        self.hl7v2.validate("conversion.hl7v2")?;
        self.json.validate("conversion.json")?;
        Ok(())
    }
}

/// Settings for one converter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum wall-clock time for a single render, in milliseconds
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
}

impl ProcessorConfig {
    fn validate(&self, section: &str) -> Result<(), String> {
        if self.render_timeout_ms == 0 || self.render_timeout_ms > MAX_RENDER_TIMEOUT_MS {
            return Err(format!(
                "{section}.render_timeout_ms must be between 1 and {MAX_RENDER_TIMEOUT_MS}, got {}",
                self.render_timeout_ms
            ));
        }
        Ok(())
    }

    /// Immutable settings handed to the converter
    pub fn to_settings(&self) -> ProcessorSettings {
        ProcessorSettings::new(Duration::from_millis(self.render_timeout_ms))
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            render_timeout_ms: default_render_timeout_ms(),
        }
    }
}

/// How to authenticate against a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistryAuthType {
    /// Public registry, no credentials
    #[default]
    Anonymous,
    /// Username and password
    Basic,
    /// Azure AD service principal exchanged for an ACR refresh token
    AzureAd,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// A template registry server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryServerConfig {
    /// Registry host, optionally with port (e.g. `contoso.azurecr.io`)
    pub server: String,

    /// Authentication type
    #[serde(default)]
    pub auth_type: RegistryAuthType,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Azure AD tenant for `azure_ad`
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Azure AD application (client) ID for `azure_ad`
    #[serde(default)]
    pub client_id: Option<String>,

    /// Azure AD client secret for `azure_ad`
    #[serde(default)]
    pub client_secret: Option<SecretString>,

    /// TLS certificate verification enabled
    ///
    /// Must stay `true` in production (enforced by validation).
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Largest accepted template layer, compressed, in bytes
    #[serde(default = "default_max_layer_size_bytes")]
    pub max_layer_size_bytes: u64,

    /// Retry configuration for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl RegistryServerConfig {
    /// Creates an anonymous registry configuration with defaults
    pub fn anonymous(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            auth_type: RegistryAuthType::Anonymous,
            username: None,
            password: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            tls_verify: true,
            timeout_seconds: default_timeout_seconds(),
            max_layer_size_bytes: default_max_layer_size_bytes(),
            retry: RetryConfig::default(),
        }
    }

    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.server.trim().is_empty() {
            return Err("registries.server cannot be empty".to_string());
        }

        if self.server.contains("://") || self.server.contains('/') {
            return Err(format!(
                "registries.server '{}' must be a host name without scheme or path",
                self.server
            ));
        }

        match self.auth_type {
            RegistryAuthType::Anonymous => {}
            RegistryAuthType::Basic => {
                if self.username.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
                    return Err(format!(
                        "registries.username cannot be empty when auth_type is 'basic' (server '{}')",
                        self.server
                    ));
                }
                if self
                    .password
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(format!(
                        "registries.password cannot be empty when auth_type is 'basic' (server '{}')",
                        self.server
                    ));
                }
            }
            RegistryAuthType::AzureAd => {
                for (name, value) in [("tenant_id", &self.tenant_id), ("client_id", &self.client_id)]
                {
                    if value.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
                        return Err(format!(
                            "registries.{name} is required when auth_type is 'azure_ad' (server '{}')",
                            self.server
                        ));
                    }
                }
                if self
                    .client_secret
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(format!(
                        "registries.client_secret is required when auth_type is 'azure_ad' (server '{}')",
                        self.server
                    ));
                }
            }
        }

        // Security: Enforce TLS verification in production environments
        if *environment == Environment::Production && !self.tls_verify {
            return Err(format!(
                "TLS certificate verification cannot be disabled in production environments \
                (registry '{}'). Set 'tls_verify = true' or use environment = \"development\".",
                self.server
            ));
        }

        if self.timeout_seconds == 0 {
            return Err("registries.timeout_seconds must be greater than 0".to_string());
        }

        if self.max_layer_size_bytes == 0 {
            return Err("registries.max_layer_size_bytes must be greater than 0".to_string());
        }

        if self.retry.max_retries == 0 || self.retry.max_retries > 10 {
            return Err(format!(
                "registries.retry.max_retries must be between 1 and 10, got {}",
                self.retry.max_retries
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }

    /// Console-only logging
    pub fn console_only() -> Self {
        Self {
            local_enabled: false,
            ..Self::default()
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_render_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_max_layer_size_bytes() -> u64 {
    // 50 MiB
    50 * 1024 * 1024
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_local_path() -> String {
    "/var/log/fhir-bridge".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn basic_registry() -> RegistryServerConfig {
        RegistryServerConfig {
            auth_type: RegistryAuthType::Basic,
            username: Some("user".to_string()),
            password: Some(secret_string("pass".to_string())),
            ..RegistryServerConfig::anonymous("contoso.azurecr.io")
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_render_timeout_bounds() {
        let mut config = ProcessorConfig::default();
        assert!(config.validate("conversion.hl7v2").is_ok());

        config.render_timeout_ms = 0;
        let err = config.validate("conversion.hl7v2").unwrap_err();
        assert!(err.contains("conversion.hl7v2.render_timeout_ms"));

        config.render_timeout_ms = MAX_RENDER_TIMEOUT_MS + 1;
        assert!(config.validate("conversion.hl7v2").is_err());
    }

    #[test]
    fn test_processor_settings_from_config() {
        let config = ProcessorConfig {
            render_timeout_ms: 1500,
        };
        assert_eq!(
            config.to_settings().render_timeout(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_basic_registry_requires_credentials() {
        assert!(basic_registry().validate(&Environment::Development).is_ok());

        let mut config = basic_registry();
        config.password = None;
        let err = config.validate(&Environment::Development).unwrap_err();
        assert!(err.contains("password"));

        let mut config = basic_registry();
        config.username = Some(String::new());
        assert!(config.validate(&Environment::Development).is_err());
    }

    #[test]
    fn test_azure_ad_registry_requires_service_principal() {
        let mut config = RegistryServerConfig {
            auth_type: RegistryAuthType::AzureAd,
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some(secret_string("secret".to_string())),
            ..RegistryServerConfig::anonymous("contoso.azurecr.io")
        };
        assert!(config.validate(&Environment::Development).is_ok());

        config.tenant_id = None;
        let err = config.validate(&Environment::Development).unwrap_err();
        assert!(err.contains("tenant_id"));
    }

    #[test]
    fn test_registry_server_must_be_host() {
        let config = RegistryServerConfig::anonymous("https://contoso.azurecr.io");
        assert!(config.validate(&Environment::Development).is_err());
    }

    #[test]
    fn test_tls_verification_in_production() {
        let mut config = basic_registry();
        config.tls_verify = false;

        let result = config.validate(&Environment::Production);
        assert!(result
            .unwrap_err()
            .contains("TLS certificate verification cannot be disabled in production"));

        assert!(config.validate(&Environment::Development).is_ok());
        assert!(config.validate(&Environment::Staging).is_ok());
    }

    #[test]
    fn test_duplicate_registries_rejected() {
        let config = BridgeConfig {
            registries: vec![
                RegistryServerConfig::anonymous("contoso.azurecr.io"),
                RegistryServerConfig::anonymous("Contoso.AzureCR.io"),
            ],
            ..BridgeConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("more than once"));
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let config = BridgeConfig {
            registries: vec![RegistryServerConfig::anonymous("contoso.azurecr.io")],
            ..BridgeConfig::default()
        };
        assert!(config.registry("CONTOSO.azurecr.io").is_some());
        assert!(config.registry("fabrikam.azurecr.io").is_none());
    }

    #[test]
    fn test_logging_rotation_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_type_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            auth_type: RegistryAuthType,
        }

        let parsed: Wrapper = toml::from_str("auth_type = \"azure_ad\"").unwrap();
        assert_eq!(parsed.auth_type, RegistryAuthType::AzureAd);
    }
}
