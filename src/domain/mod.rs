//! Domain models and types for FHIR Bridge.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Requests** ([`ConversionRequest`], [`InputDataType`])
//! - **Template collections** ([`TemplateCollection`], [`TemplateLayer`], [`Template`])
//! - **References** ([`TemplateReference`], [`ImageReference`])
//! - **Registry credentials** ([`AccessToken`])
//! - **Error types** ([`ConversionError`], [`RegistryError`], [`ConverterError`], [`BridgeError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! The resolver and the dispatcher only ever return [`ConversionError`], whose
//! [`ConversionErrorKind`] is one of a small closed set:
//!
//! ```rust
//! use fhir_bridge::domain::{ConversionError, ConversionErrorKind};
//!
//! let err = ConversionError::new(ConversionErrorKind::ConvertTimeout, "Rendering timed out");
//! assert_eq!(err.kind().code(), "ConvertTimeout");
//! ```

pub mod errors;
pub mod reference;
pub mod request;
pub mod result;
pub mod template;
pub mod token;

// Re-export commonly used types for convenience
pub use errors::{
    BridgeError, ConversionError, ConversionErrorKind, ConverterError, RegistryError,
};
pub use reference::{ImageReference, ImageVersion, ReferenceKind, TemplateReference};
pub use request::{ConversionRequest, ConversionRequestBuilder, InputDataType};
pub use result::Result;
pub use template::{Template, TemplateCollection, TemplateLayer};
pub use token::{AccessToken, RegistryCredential};
