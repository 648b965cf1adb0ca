//! Conversion dispatch
//!
//! - [`Converter`] - trait implemented by per-input-type converters
//! - [`ConverterRegistry`] - input type to converter lookup
//! - [`ConversionDispatcher`] - routes requests and normalizes failures

pub mod dispatcher;
pub mod registry;
pub mod traits;

pub use dispatcher::{map_converter_error, ConversionDispatcher};
pub use registry::{ConverterRegistry, ConverterRegistryBuilder};
pub use traits::{Converter, ProcessorSettings};
