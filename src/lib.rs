// FHIR Bridge - Template-driven conversion of healthcare messages to FHIR
// Copyright (c) 2025 FHIR Bridge Contributors
// Licensed under the MIT License

//! # FHIR Bridge
//!
//! FHIR Bridge converts HL7 v2 messages and JSON documents into FHIR R4 bundles
//! by rendering Handlebars templates. Template collections are either built into
//! the binary or pulled as OCI images from a container registry.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Template collection resolution and conversion dispatch
//! - [`adapters`] - Converters, the template renderer and registry access
//! - [`domain`] - Requests, references, template collections and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_bridge::config::BridgeConfig;
//! use fhir_bridge::core::cancel::never_cancelled;
//! use fhir_bridge::core::convert::{ConversionDispatcher, ConverterRegistry};
//! use fhir_bridge::core::resolve::TemplateCollectionResolver;
//! use fhir_bridge::domain::{ConversionRequest, InputDataType};
//! use std::sync::Arc;
//!
//! # async fn example(message: String) -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let cancel = never_cancelled();
//!
//! let request = ConversionRequest::builder()
//!     .input_data(message)
//!     .input_type(InputDataType::Hl7v2)
//!     .root_template("ADT_A01")
//!     .build()?;
//!
//! let resolver = TemplateCollectionResolver::from_config(&config);
//! let templates = resolver
//!     .resolve(&request.template_reference, &request.registry_server, &cancel)
//!     .await?;
//!
//! let dispatcher =
//!     ConversionDispatcher::new(Arc::new(ConverterRegistry::from_config(&config.conversion)));
//! let bundle = dispatcher.convert(&request, &templates, &cancel).await?;
//! println!("{bundle}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Resolution and conversion fail with [`domain::ConversionError`], which always
//! carries one [`domain::ConversionErrorKind`]. Configuration and logging setup
//! use [`domain::BridgeError`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
