//! JSON input support
//!
//! Raw JSON input is used directly as the template data model.

use crate::adapters::render::HandlebarsRenderer;
use crate::core::cancel::CancelSignal;
use crate::core::convert::{Converter, ProcessorSettings};
use crate::domain::{ConverterError, InputDataType, TemplateCollection};
use async_trait::async_trait;
use serde_json::Value;

/// Converts JSON documents by rendering them through Handlebars templates
#[derive(Debug, Clone)]
pub struct JsonConverter {
    renderer: HandlebarsRenderer,
}

impl JsonConverter {
    pub fn new(settings: ProcessorSettings) -> Self {
        Self {
            renderer: HandlebarsRenderer::new(settings),
        }
    }
}

#[async_trait]
impl Converter for JsonConverter {
    fn input_type(&self) -> InputDataType {
        InputDataType::Json
    }

    fn settings(&self) -> &ProcessorSettings {
        self.renderer.settings()
    }

    async fn render(
        &self,
        raw_input: &str,
        entry_template: &str,
        templates: &TemplateCollection,
        cancel: &CancelSignal,
    ) -> Result<String, ConverterError> {
        let data: Value = serde_json::from_str(raw_input)
            .map_err(|e| ConverterError::InputParse(format!("Input is not valid JSON: {e}")))?;

        if !data.is_object() && !data.is_array() {
            return Err(ConverterError::InputParse(
                "Input must be a JSON object or array".to_string(),
            ));
        }

        self.renderer
            .render(data, entry_template, templates, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cancel::never_cancelled;
    use crate::domain::{Template, TemplateLayer};

    fn templates() -> TemplateCollection {
        TemplateCollection::new(vec![TemplateLayer::from_templates([Template::new(
            "Person",
            r#"{ "resourceType": "Patient", "name": [{ "family": "{{lastName}}" }] }"#,
        )])])
    }

    #[tokio::test]
    async fn test_json_render() {
        let converter = JsonConverter::new(ProcessorSettings::default());
        let output = converter
            .render(
                r#"{ "lastName": "Doe" }"#,
                "Person",
                &templates(),
                &never_cancelled(),
            )
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["name"][0]["family"], "Doe");
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let converter = JsonConverter::new(ProcessorSettings::default());
        for input in ["{ broken", "42"] {
            let err = converter
                .render(input, "Person", &templates(), &never_cancelled())
                .await
                .unwrap_err();
            assert!(matches!(err, ConverterError::InputParse(_)));
        }
    }
}
