//! CLI command implementations
//!
//! Every command returns its process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 2 | Configuration error |
//! | 3 | Input or request error |
//! | 4 | Conversion or template resolution failure |
//! | 5 | Fatal error |

pub mod convert;
pub mod list_templates;
pub mod validate;

use crate::config::{load_config, BridgeConfig};
use crate::domain::Result;
use std::path::Path;

/// Configuration file looked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "fhir-bridge.toml";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG_ERROR: i32 = 2;
pub const EXIT_INPUT_ERROR: i32 = 3;
pub const EXIT_CONVERSION_ERROR: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Loads the configuration used by runtime commands
///
/// A missing file at the default location yields built-in defaults, so the
/// default template collection works without any configuration. An explicitly
/// named file must exist.
pub fn load_runtime_config(config_path: &str) -> Result<BridgeConfig> {
    if config_path == DEFAULT_CONFIG_PATH && !Path::new(config_path).exists() {
        tracing::debug!(
            config_path = %config_path,
            "No configuration file found, using defaults"
        );
        return Ok(BridgeConfig::default());
    }
    load_config(config_path)
}
