//! Converter trait definition
//!
//! A converter turns raw input of one [`InputDataType`] into output text by
//! rendering an entry template from a [`TemplateCollection`].

use crate::core::cancel::CancelSignal;
use crate::domain::{ConverterError, InputDataType, TemplateCollection};
use async_trait::async_trait;
use std::time::Duration;

/// Per-converter settings, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    render_timeout: Duration,
}

impl ProcessorSettings {
    /// Default render budget
    pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(render_timeout: Duration) -> Self {
        Self { render_timeout }
    }

    /// Maximum wall-clock time a single render may take
    pub fn render_timeout(&self) -> Duration {
        self.render_timeout
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RENDER_TIMEOUT)
    }
}

/// Trait for converter implementations
///
/// Implementations are stateless between calls and shared across requests, so
/// they must be `Send + Sync`. A render must honor both its own
/// [`ProcessorSettings::render_timeout`] and the cancel signal.
///
/// # Example
///
/// ```no_run
/// use fhir_bridge::core::cancel::never_cancelled;
/// use fhir_bridge::core::convert::Converter;
/// use fhir_bridge::domain::TemplateCollection;
///
/// # async fn example(converter: &dyn Converter, templates: &TemplateCollection) {
/// let output = converter
///     .render("MSH|^~\\&|...", "ADT_A01", templates, &never_cancelled())
///     .await;
/// # }
/// ```
#[async_trait]
pub trait Converter: Send + Sync {
    /// The input type this converter accepts
    fn input_type(&self) -> InputDataType;

    /// Settings the converter was built with
    fn settings(&self) -> &ProcessorSettings;

    /// Render `entry_template` against `raw_input`
    ///
    /// # Errors
    ///
    /// - [`ConverterError::InputParse`] if `raw_input` is malformed
    /// - [`ConverterError::Initialization`] if a template fails to compile
    /// - [`ConverterError::Timeout`] if the render budget is exceeded
    /// - [`ConverterError::Cancelled`] if the signal is raised
    /// - [`ConverterError::Render`] for any other rendering failure
    async fn render(
        &self,
        raw_input: &str,
        entry_template: &str,
        templates: &TemplateCollection,
        cancel: &CancelSignal,
    ) -> Result<String, ConverterError>;
}
