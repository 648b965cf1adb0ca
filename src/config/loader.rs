//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BridgeConfig;
use crate::config::secret_string;
use crate::domain::errors::BridgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "FHIR_BRIDGE_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BridgeConfig
/// 4. Applies environment variable overrides (FHIR_BRIDGE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use fhir_bridge::config::loader::load_config;
///
/// let config = load_config("fhir-bridge.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BridgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BridgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] without the file access.
pub fn load_config_from_str(contents: &str) -> Result<BridgeConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BridgeConfig = toml::from_str(&contents)
        .map_err(|e| BridgeError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        BridgeError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BridgeError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(BridgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the FHIR_BRIDGE_* prefix
///
/// Environment variables follow the pattern: FHIR_BRIDGE_<SECTION>_<KEY>.
/// Registry credentials are overridden per server with the server name upper-cased
/// and every non-alphanumeric character replaced by `_`, e.g.
/// `FHIR_BRIDGE_REGISTRY_CONTOSO_AZURECR_IO_PASSWORD`.
fn apply_env_overrides(config: &mut BridgeConfig) -> Result<()> {
    if let Ok(val) = env("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Ok(val) = env("ENVIRONMENT") {
        config.environment = match val.to_lowercase().as_str() {
            "development" => super::schema::Environment::Development,
            "staging" => super::schema::Environment::Staging,
            "production" => super::schema::Environment::Production,
            other => {
                return Err(BridgeError::Configuration(format!(
                    "Invalid {ENV_PREFIX}ENVIRONMENT '{other}'"
                )))
            }
        };
    }

    if let Ok(val) = env("CONVERSION_HL7V2_RENDER_TIMEOUT_MS") {
        config.conversion.hl7v2.render_timeout_ms =
            parse_override("CONVERSION_HL7V2_RENDER_TIMEOUT_MS", &val)?;
    }
    if let Ok(val) = env("CONVERSION_JSON_RENDER_TIMEOUT_MS") {
        config.conversion.json.render_timeout_ms =
            parse_override("CONVERSION_JSON_RENDER_TIMEOUT_MS", &val)?;
    }

    for registry in &mut config.registries {
        let key = registry_env_key(&registry.server);
        if let Ok(val) = env(&format!("REGISTRY_{key}_USERNAME")) {
            registry.username = Some(val);
        }
        if let Ok(val) = env(&format!("REGISTRY_{key}_PASSWORD")) {
            registry.password = Some(secret_string(val));
        }
        if let Ok(val) = env(&format!("REGISTRY_{key}_CLIENT_SECRET")) {
            registry.client_secret = Some(secret_string(val));
        }
    }

    if let Ok(val) = env("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = env("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

fn env(key: &str) -> std::result::Result<String, std::env::VarError> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
}

fn parse_override(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        BridgeError::Configuration(format!(
            "{ENV_PREFIX}{key} must be a positive integer, got '{value}'"
        ))
    })
}

/// Environment key fragment for a registry server
fn registry_env_key(server: &str) -> String {
    server
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
