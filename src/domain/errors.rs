//! Domain error types
//!
//! This module defines the error hierarchy for FHIR Bridge.
//!
//! Only [`ConversionError`] crosses the boundary of the resolver and the
//! dispatcher. [`RegistryError`] and [`ConverterError`] are the failure kinds
//! reported by collaborators (token providers, registry transports, converters)
//! and are always re-expressed as exactly one [`ConversionErrorKind`] before
//! they reach a caller. [`BridgeError`] covers application-level concerns such as
//! configuration and logging setup.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed cause kept on a [`ConversionError`] for diagnostics
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main application error type
///
/// Used by configuration loading, logging setup and the CLI. Conversion failures
/// are carried unchanged through the [`BridgeError::Conversion`] variant.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Conversion or template resolution failure
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// The closed taxonomy of conversion failures
///
/// Every failure reported to a caller of the resolver or the dispatcher carries
/// exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConversionErrorKind {
    /// The requested input type has no registered converter
    InvalidInputType,
    /// Raw input could not be parsed as the declared input type
    InputParseError,
    /// Converter or template engine failed to initialize (e.g. template compile error)
    ConverterInitError,
    /// Rendering exceeded its configured time budget
    ConvertTimeout,
    /// Any other rendering failure
    ConvertFailed,
    /// Token acquisition for a registry-hosted collection failed
    RegistryAuthFailed,
    /// Collection fetch or content validation failed
    TemplateFetchFailed,
}

impl ConversionErrorKind {
    /// Stable machine-readable code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInputType => "InvalidInputType",
            Self::InputParseError => "InputParseError",
            Self::ConverterInitError => "ConverterInitError",
            Self::ConvertTimeout => "ConvertTimeout",
            Self::ConvertFailed => "ConvertFailed",
            Self::RegistryAuthFailed => "RegistryAuthFailed",
            Self::TemplateFetchFailed => "TemplateFetchFailed",
        }
    }

    /// Whether this kind originates in template resolution rather than rendering
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::RegistryAuthFailed | Self::TemplateFetchFailed)
    }
}

impl fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Typed failure returned by the resolver and the dispatcher
///
/// The message is safe to surface to a caller. The original collaborator error,
/// when there is one, is kept as the [`std::error::Error::source`] for logging.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ConversionError {
    kind: ConversionErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ConversionError {
    /// Creates a new error of the given kind
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the original cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the taxonomy kind
    pub fn kind(&self) -> ConversionErrorKind {
        self.kind
    }

    /// Returns the caller-safe message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failures reported by token providers and registry transports
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Credentials were rejected or could not be obtained
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The registry refused the pull for the presented credential
    #[error("Access denied by registry: {0}")]
    Unauthorized(String),

    /// No configuration exists for the requested registry
    #[error("Registry not configured: {0}")]
    NotConfigured(String),

    /// Manifest or blob does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The template reference does not have a valid image shape
    #[error("Invalid template reference: {0}")]
    InvalidReference(String),

    /// Network failure or unexpected registry status
    #[error("Failed to connect to registry: {0}")]
    ConnectionFailed(String),

    /// Downloaded content failed integrity or shape validation
    #[error("Content validation failed: {0}")]
    ValidationFailed(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Anything not covered above
    #[error("Unexpected registry failure: {0}")]
    Unexpected(String),
}

impl RegistryError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

/// Failures reported by converter implementations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConverterError {
    /// Raw input is malformed for the declared type
    #[error("Failed to parse input: {0}")]
    InputParse(String),

    /// Templates could not be compiled or the engine could not start
    #[error("Failed to initialize converter: {0}")]
    Initialization(String),

    /// Rendering exceeded its time budget
    #[error("Rendering exceeded the time budget of {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Template runtime failure
    #[error("Rendering failed: {0}")]
    Render(String),

    /// The caller cancelled the operation
    #[error("Rendering cancelled")]
    Cancelled,
}

// Conversion from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Configuration(format!("TOML parse error: {err}"))
    }
}
