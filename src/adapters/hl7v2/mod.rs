//! HL7v2 input support
//!
//! - [`parser`] - segment/field/component parser and template data model
//! - [`Hl7v2Converter`] - the converter registered for HL7v2 input

pub mod converter;
pub mod parser;

pub use converter::Hl7v2Converter;
pub use parser::{parse_message, Delimiters, Message, Segment};
