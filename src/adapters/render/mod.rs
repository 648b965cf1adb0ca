//! Handlebars rendering engine
//!
//! Every render builds a fresh registry from the template collection, so the
//! registry never outlives one request and layers can be overridden freely.
//! Templates are registered layer by layer in order; a template name defined
//! in a later layer replaces the earlier definition both as an entry template
//! and as a partial (`{{> Name}}`).
//!
//! Rendering is CPU-bound and runs on the blocking pool, raced against the
//! render timeout and the cancel signal. A render that loses the race is
//! abandoned and its output discarded.

pub mod helpers;
pub mod postprocess;

use crate::core::cancel::{cancelled, is_cancelled, CancelSignal};
use crate::core::convert::ProcessorSettings;
use crate::domain::{ConverterError, TemplateCollection};
use handlebars::Handlebars;
use serde_json::Value;

/// Renders JSON data through a template collection
#[derive(Debug, Clone)]
pub struct HandlebarsRenderer {
    settings: ProcessorSettings,
}

impl HandlebarsRenderer {
    pub fn new(settings: ProcessorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Renders `entry_template` with `data` as the root context
    pub async fn render(
        &self,
        data: Value,
        entry_template: &str,
        templates: &TemplateCollection,
        cancel: &CancelSignal,
    ) -> Result<String, ConverterError> {
        if is_cancelled(cancel) {
            return Err(ConverterError::Cancelled);
        }

        let budget = self.settings.render_timeout();
        let templates = templates.clone();
        let entry = entry_template.to_string();
        let task =
            tokio::task::spawn_blocking(move || render_blocking(&templates, &entry, &data));

        tokio::select! {
            joined = tokio::time::timeout(budget, task) => match joined {
                Err(_) => {
                    tracing::warn!(
                        entry_template = %entry_template,
                        budget_ms = budget.as_millis() as u64,
                        "Render exceeded its time budget"
                    );
                    Err(ConverterError::Timeout(budget))
                }
                Ok(Err(e)) => Err(ConverterError::Render(format!("Render task failed: {e}"))),
                Ok(Ok(result)) => result,
            },
            _ = cancelled(cancel) => Err(ConverterError::Cancelled),
        }
    }
}

/// Compiles every template of the collection into a registry
///
/// # Errors
///
/// [`ConverterError::Initialization`] naming the first template that fails to
/// compile.
pub fn compile(templates: &TemplateCollection) -> Result<Handlebars<'static>, ConverterError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(escape_json);
    helpers::register_helpers(&mut handlebars);

    for layer in templates.layers() {
        for template in layer.templates() {
            handlebars
                .register_template_string(template.name(), template.source())
                .map_err(|e| {
                    ConverterError::Initialization(format!(
                        "Template '{}' failed to compile: {e}",
                        template.name()
                    ))
                })?;
        }
    }

    Ok(handlebars)
}

fn render_blocking(
    templates: &TemplateCollection,
    entry_template: &str,
    data: &Value,
) -> Result<String, ConverterError> {
    let handlebars = compile(templates)?;

    if !handlebars.has_template(entry_template) {
        return Err(ConverterError::Render(format!(
            "Entry template '{entry_template}' does not exist in the template collection"
        )));
    }

    let rendered = handlebars
        .render(entry_template, data)
        .map_err(|e| ConverterError::Render(e.to_string()))?;

    postprocess::finalize_output(&rendered)
}

/// Escapes a value for use inside a JSON string literal
pub fn escape_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
