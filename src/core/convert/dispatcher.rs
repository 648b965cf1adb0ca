//! Conversion dispatcher
//!
//! Routes a [`ConversionRequest`] to the converter registered for its input
//! type, bounds the render by the converter's time budget and re-expresses any
//! converter failure as a single [`ConversionError`].

use super::registry::ConverterRegistry;
use crate::core::cancel::{cancelled, CancelSignal};
use crate::domain::{
    ConversionError, ConversionErrorKind, ConversionRequest, ConverterError, TemplateCollection,
};
use crate::log_conversion_failure;
use std::sync::Arc;
use std::time::Instant;

/// Dispatches conversion requests to registered converters
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use fhir_bridge::config::ConversionConfig;
/// use fhir_bridge::core::cancel::never_cancelled;
/// use fhir_bridge::core::convert::{ConversionDispatcher, ConverterRegistry};
/// use fhir_bridge::domain::{ConversionRequest, InputDataType, TemplateCollection};
///
/// # async fn example(templates: TemplateCollection) -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(ConverterRegistry::from_config(&ConversionConfig::default()));
/// let dispatcher = ConversionDispatcher::new(registry);
///
/// let request = ConversionRequest::builder()
///     .input_data("MSH|^~\\&|...")
///     .input_type(InputDataType::Hl7v2)
///     .root_template("ADT_A01")
///     .build()?;
///
/// let bundle = dispatcher.convert(&request, &templates, &never_cancelled()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConversionDispatcher {
    registry: Arc<ConverterRegistry>,
}

impl ConversionDispatcher {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher routes through
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Converts one request against an already resolved template collection
    ///
    /// Output is returned only on complete success.
    ///
    /// # Errors
    ///
    /// - `InvalidInputType` when no converter is registered for the input type
    /// - `InputParseError`, `ConverterInitError`, `ConvertTimeout` or
    ///   `ConvertFailed` for converter failures
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        templates: &TemplateCollection,
        cancel: &CancelSignal,
    ) -> Result<String, ConversionError> {
        let Some(converter) = self.registry.get(request.input_type) else {
            let err = ConversionError::new(
                ConversionErrorKind::InvalidInputType,
                format!(
                    "No converter is registered for input type '{}'",
                    request.input_type
                ),
            );
            log_conversion_failure!(err, request.input_type, request.root_template);
            return Err(err);
        };

        if request.root_template.trim().is_empty() {
            let err = ConversionError::new(
                ConversionErrorKind::ConvertFailed,
                "Entry template name cannot be empty",
            );
            log_conversion_failure!(err, request.input_type, request.root_template);
            return Err(err);
        }

        let budget = converter.settings().render_timeout();
        let started = Instant::now();

        let outcome = tokio::select! {
            result = tokio::time::timeout(
                budget,
                converter.render(&request.input_data, &request.root_template, templates, cancel),
            ) => match result {
                Ok(rendered) => rendered,
                Err(_) => Err(ConverterError::Timeout(budget)),
            },
            _ = cancelled(cancel) => Err(ConverterError::Cancelled),
        };

        match outcome {
            Ok(output) => {
                tracing::debug!(
                    input_type = %request.input_type,
                    entry_template = %request.root_template,
                    reference = %request.template_reference,
                    duration_ms = started.elapsed().as_millis() as u64,
                    output_bytes = output.len(),
                    "Conversion succeeded"
                );
                Ok(output)
            }
            Err(e) => {
                let err = map_converter_error(e);
                log_conversion_failure!(err, request.input_type, request.root_template);
                tracing::debug!(
                    reference = %request.template_reference,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Conversion failure details"
                );
                Err(err)
            }
        }
    }
}

/// Maps a converter-reported failure to the conversion error taxonomy
pub fn map_converter_error(err: ConverterError) -> ConversionError {
    let (kind, message) = match &err {
        ConverterError::InputParse(_) => (
            ConversionErrorKind::InputParseError,
            "The input could not be parsed as the declared input type",
        ),
        ConverterError::Initialization(_) => (
            ConversionErrorKind::ConverterInitError,
            "The converter failed to initialize its templates",
        ),
        ConverterError::Timeout(_) => (
            ConversionErrorKind::ConvertTimeout,
            "Rendering exceeded its time budget",
        ),
        ConverterError::Render(_) => (ConversionErrorKind::ConvertFailed, "Rendering failed"),
        ConverterError::Cancelled => (
            ConversionErrorKind::ConvertFailed,
            "Conversion was cancelled",
        ),
    };
    ConversionError::new(kind, format!("{message}: {err}")).with_source(err)
}
