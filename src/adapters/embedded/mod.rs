//! Built-in default template collection
//!
//! HL7v2 to FHIR R4 templates compiled into the binary. They are served for
//! the default template reference without any network access.

use crate::adapters::registry::DefaultCollectionProvider;
use crate::domain::{RegistryError, Template, TemplateCollection, TemplateLayer};

macro_rules! embedded_template {
    ($name:literal) => {
        (
            $name,
            include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/templates/default/",
                $name,
                ".hbs"
            )),
        )
    };
}

/// Templates of the default collection, by name
pub const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    embedded_template!("ADT_A01"),
    embedded_template!("ADT_A04"),
    embedded_template!("ADT_A08"),
    embedded_template!("ORU_R01"),
    embedded_template!("MessageHeader"),
    embedded_template!("Patient"),
    embedded_template!("Encounter"),
    embedded_template!("AllergyIntolerance"),
    embedded_template!("DiagnosticReport"),
    embedded_template!("Observation"),
    embedded_template!("JsonPatient"),
];

/// Serves the embedded default collection
#[derive(Debug, Clone)]
pub struct EmbeddedCollectionProvider {
    collection: TemplateCollection,
}

impl EmbeddedCollectionProvider {
    pub fn new() -> Self {
        let layer = TemplateLayer::from_templates(
            DEFAULT_TEMPLATES
                .iter()
                .map(|(name, source)| Template::new(*name, *source)),
        );
        Self {
            collection: TemplateCollection::new(vec![layer]),
        }
    }
}

impl Default for EmbeddedCollectionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCollectionProvider for EmbeddedCollectionProvider {
    fn get_collection(&self) -> Result<TemplateCollection, RegistryError> {
        Ok(self.collection.clone())
    }
}
