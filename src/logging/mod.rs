//! Logging and observability
//!
//! Structured logging built on `tracing`, plus a few macros that keep the
//! field names of recurring events consistent across the crate.
//!
//! # Example
//!
//! ```no_run
//! use fhir_bridge::logging::init_logging;
//! use fhir_bridge::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log which path the resolver took for a template reference
///
/// # Example
///
/// ```no_run
/// use fhir_bridge::log_resolution_path;
///
/// log_resolution_path!("default", "microsofthealth/fhirconverter:default", "");
/// ```
#[macro_export]
macro_rules! log_resolution_path {
    ($path:expr, $reference:expr, $server:expr) => {
        tracing::info!(
            path = $path,
            reference = %$reference,
            registry_server = %$server,
            "Resolving template collection"
        );
    };
}

/// Log a conversion failure with its taxonomy kind
///
/// The raw input is never logged.
///
/// # Example
///
/// ```no_run
/// use fhir_bridge::log_conversion_failure;
/// use fhir_bridge::domain::{ConversionError, ConversionErrorKind};
///
/// let err = ConversionError::new(ConversionErrorKind::ConvertFailed, "boom");
/// log_conversion_failure!(&err, "hl7v2", "ADT_A01");
/// ```
#[macro_export]
macro_rules! log_conversion_failure {
    ($error:expr, $input_type:expr, $entry:expr) => {
        tracing::error!(
            kind = %$error.kind(),
            error = %$error,
            input_type = %$input_type,
            entry_template = %$entry,
            "Conversion failed"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use fhir_bridge::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying registry request"
        );
    };
}
