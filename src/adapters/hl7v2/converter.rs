//! HL7v2 converter

use super::parser::parse_message;
use crate::adapters::render::HandlebarsRenderer;
use crate::core::cancel::CancelSignal;
use crate::core::convert::{Converter, ProcessorSettings};
use crate::domain::{ConverterError, InputDataType, TemplateCollection};
use async_trait::async_trait;

/// Converts HL7v2 messages by rendering them through Handlebars templates
#[derive(Debug, Clone)]
pub struct Hl7v2Converter {
    renderer: HandlebarsRenderer,
}

impl Hl7v2Converter {
    pub fn new(settings: ProcessorSettings) -> Self {
        Self {
            renderer: HandlebarsRenderer::new(settings),
        }
    }
}

#[async_trait]
impl Converter for Hl7v2Converter {
    fn input_type(&self) -> InputDataType {
        InputDataType::Hl7v2
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
        let message = parse_message(raw_input).map_err(ConverterError::InputParse)?;

        tracing::debug!(
            message_type = %message.message_type(),
            trigger_event = %message.trigger_event(),
            segments = message.segments.len(),
            entry_template = %entry_template,
            "Parsed HL7v2 message"
        );

        self.renderer
            .render(message.to_json(), entry_template, templates, cancel)
            .await
    }
}
