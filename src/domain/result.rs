//! Result type alias for FHIR Bridge

use super::errors::BridgeError;

/// Result type alias for application-level operations
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::result::Result;
/// use fhir_bridge::domain::errors::BridgeError;
///
/// fn failing_function() -> Result<()> {
///     Err(BridgeError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BridgeError>;
