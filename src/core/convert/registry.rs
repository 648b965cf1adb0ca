//! Converter registry
//!
//! Static mapping from [`InputDataType`] to converter, built once at startup
//! and shared read-only behind an `Arc`.

use super::traits::Converter;
use crate::adapters::hl7v2::Hl7v2Converter;
use crate::adapters::json::JsonConverter;
use crate::config::ConversionConfig;
use crate::domain::InputDataType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lookup table of converters keyed by input type
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<InputDataType, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Builds the standard registry from configuration
    ///
    /// HL7v2 and JSON inputs get their converters. C-CDA is a known input type
    /// without a converter and is rejected by the dispatcher.
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::builder()
            .register(Arc::new(Hl7v2Converter::new(config.hl7v2.to_settings())))
            .register(Arc::new(JsonConverter::new(config.json.to_settings())))
            .build()
    }

    pub fn builder() -> ConverterRegistryBuilder {
        ConverterRegistryBuilder::default()
    }

    /// Converter registered for `input_type`, if any
    pub fn get(&self, input_type: InputDataType) -> Option<Arc<dyn Converter>> {
        self.converters.get(&input_type).cloned()
    }

    /// Registered input types, in declaration order
    pub fn input_types(&self) -> Vec<InputDataType> {
        InputDataType::ALL
            .iter()
            .copied()
            .filter(|t| self.converters.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("input_types", &self.input_types())
            .finish()
    }
}

/// Builder for [`ConverterRegistry`]
#[derive(Default)]
pub struct ConverterRegistryBuilder {
    converters: HashMap<InputDataType, Arc<dyn Converter>>,
}

impl ConverterRegistryBuilder {
    /// Registers a converter under its own input type, replacing any previous one
    pub fn register(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.insert(converter.input_type(), converter);
        self
    }

    pub fn build(self) -> ConverterRegistry {
        ConverterRegistry {
            converters: self.converters,
        }
    }
}
