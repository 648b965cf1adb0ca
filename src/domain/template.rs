//! Template collection domain model
//!
//! A [`TemplateCollection`] is an ordered list of [`TemplateLayer`]s. Each layer
//! maps template names to [`Template`]s. When the same name appears in more than
//! one layer, the last layer containing it wins.

use std::collections::BTreeMap;
use std::sync::Arc;

/// A named template in source form
///
/// Templates are compiled by the converter that renders them, so a template
/// that does not compile is reported at conversion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
}

impl Template {
    /// Creates a new template
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Template name, used for lookup and for partial references
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template source text
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One layer of a template collection
///
/// Names are unique within a layer. Layers are immutable once built and cheap to
/// clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateLayer {
    templates: Arc<BTreeMap<String, Template>>,
}

impl TemplateLayer {
    /// Builds a layer from templates; a later template with a duplicate name replaces
    /// the earlier one
    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect::<BTreeMap<_, _>>();
        Self {
            templates: Arc::new(templates),
        }
    }

    /// Looks up a template in this layer only
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Iterates the templates of this layer in name order
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the layer has no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Ordered sequence of template layers
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::template::{Template, TemplateCollection, TemplateLayer};
///
/// let base = TemplateLayer::from_templates([Template::new("Patient", "base")]);
/// let custom = TemplateLayer::from_templates([Template::new("Patient", "custom")]);
/// let collection = TemplateCollection::new(vec![base, custom]);
///
/// assert_eq!(collection.get("Patient").unwrap().source(), "custom");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCollection {
    layers: Vec<TemplateLayer>,
}

impl TemplateCollection {
    /// Creates a collection from layers, outermost first
    pub fn new(layers: Vec<TemplateLayer>) -> Self {
        Self { layers }
    }

    /// The layers in resolution order
    pub fn layers(&self) -> &[TemplateLayer] {
        &self.layers
    }

    /// Looks up a template by name; the last layer containing it wins
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.layers.iter().rev().find_map(|layer| layer.get(name))
    }

    /// Whether any layer defines `name`
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Effective templates after layer overrides, in name order
    pub fn effective_templates(&self) -> Vec<&Template> {
        let mut merged: BTreeMap<&str, &Template> = BTreeMap::new();
        for layer in &self.layers {
            for template in layer.templates() {
                merged.insert(template.name(), template);
            }
        }
        merged.into_values().collect()
    }

    /// Total number of templates across all layers, counting overridden ones
    pub fn template_count(&self) -> usize {
        self.layers.iter().map(TemplateLayer::len).sum()
    }

    /// Whether the collection holds no templates at all
    pub fn is_empty(&self) -> bool {
        self.template_count() == 0
    }
}
