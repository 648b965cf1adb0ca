//! Collaborator implementations for FHIR Bridge.
//!
//! - [`registry`] - token providers and the OCI registry transport
//! - [`embedded`] - the built-in default template collection
//! - [`render`] - Handlebars rendering with time budget and output clean-up
//! - [`hl7v2`] - HL7v2 parser and converter
//! - [`json`] - JSON converter
//!
//! # Design Pattern
//!
//! The core only talks to the traits in [`registry::traits`] and
//! [`crate::core::convert::Converter`]. Everything in this module is one
//! implementation of those seams and can be swapped out, which is how the
//! integration tests inject slow converters or failing registries.

pub mod embedded;
pub mod hl7v2;
pub mod json;
pub mod registry;
pub mod render;
