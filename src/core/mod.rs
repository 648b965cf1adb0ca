//! Core conversion logic for FHIR Bridge.
//!
//! # Modules
//!
//! - [`resolve`] - Template collection resolution (default or registry-hosted)
//! - [`convert`] - Converter registry and conversion dispatch
//! - [`cancel`] - Cooperative cancellation signal
//!
//! # Conversion Workflow
//!
//! 1. **Resolve**: turn the template reference into a template collection
//! 2. **Dispatch**: pick the converter for the input type
//! 3. **Render**: render the entry template under the converter's time budget
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fhir_bridge::config::load_config;
//! use fhir_bridge::core::convert::{ConversionDispatcher, ConverterRegistry};
//! use fhir_bridge::core::resolve::TemplateCollectionResolver;
//! use fhir_bridge::domain::{ConversionRequest, InputDataType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("fhir-bridge.toml")?;
//! let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
//!
//! let resolver = TemplateCollectionResolver::from_config(&config);
//! let dispatcher =
//!     ConversionDispatcher::new(Arc::new(ConverterRegistry::from_config(&config.conversion)));
//!
//! let request = ConversionRequest::builder()
//!     .input_data(std::fs::read_to_string("adt_a01.hl7")?)
//!     .input_type(InputDataType::Hl7v2)
//!     .root_template("ADT_A01")
//!     .build()?;
//!
//! let templates = resolver
//!     .resolve(&request.template_reference, &request.registry_server, &cancel_rx)
//!     .await?;
//! let bundle = dispatcher.convert(&request, &templates, &cancel_rx).await?;
//! println!("{bundle}");
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod convert;
pub mod resolve;
