//! Convert command implementation
//!
//! Resolves the template collection, converts one input file and writes the
//! result to a file or stdout.

use super::{
    load_runtime_config, EXIT_CONFIG_ERROR, EXIT_CONVERSION_ERROR, EXIT_INPUT_ERROR,
    EXIT_SUCCESS,
};
use crate::core::cancel::CancelSignal;
use crate::core::convert::{ConversionDispatcher, ConverterRegistry};
use crate::core::resolve::TemplateCollectionResolver;
use crate::domain::{ConversionError, ConversionRequest, InputDataType, TemplateReference};
use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// File containing the message to convert
    #[arg(short, long)]
    pub input: PathBuf,

    /// Input data type (hl7v2, json, ccda)
    #[arg(long, default_value = "hl7v2")]
    pub input_type: InputDataType,

    /// Entry template name (e.g. ADT_A01)
    #[arg(short, long)]
    pub template: String,

    /// Template collection reference; defaults to the built-in collection
    #[arg(short, long)]
    pub reference: Option<String>,

    /// Registry server to authenticate against; defaults to the reference's registry
    #[arg(long, default_value = "")]
    pub registry_server: String,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    /// Execute the convert command
    pub async fn execute(&self, config_path: &str, cancel: CancelSignal) -> anyhow::Result<i32> {
        let config = match load_runtime_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        let input = match std::fs::read_to_string(&self.input) {
            Ok(input) => input,
            Err(e) => {
                eprintln!("❌ Failed to read input {}: {e}", self.input.display());
                return Ok(EXIT_INPUT_ERROR);
            }
        };

        let reference = self
            .reference
            .as_deref()
            .map(TemplateReference::new)
            .unwrap_or_else(TemplateReference::default_collection);

        let request = match ConversionRequest::builder()
            .input_data(input)
            .input_type(self.input_type)
            .template_reference(reference)
            .root_template(&self.template)
            .registry_server(&self.registry_server)
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                eprintln!("❌ Invalid request: {e}");
                return Ok(EXIT_INPUT_ERROR);
            }
        };

        tracing::info!(
            input = %self.input.display(),
            input_type = %request.input_type,
            entry_template = %request.root_template,
            reference = %request.template_reference,
            "Starting conversion"
        );

        let resolver = TemplateCollectionResolver::from_config(&config);
        let templates = match resolver
            .resolve(&request.template_reference, &request.registry_server, &cancel)
            .await
        {
            Ok(templates) => templates,
            Err(e) => return Ok(report_failure(&e)),
        };

        let dispatcher =
            ConversionDispatcher::new(Arc::new(ConverterRegistry::from_config(&config.conversion)));
        let output = match dispatcher.convert(&request, &templates, &cancel).await {
            Ok(output) => output,
            Err(e) => return Ok(report_failure(&e)),
        };

        match &self.output {
            Some(path) => {
                std::fs::write(path, &output)
                    .with_context(|| format!("Failed to write output to {}", path.display()))?;
                println!("✅ Conversion written to {}", path.display());
            }
            None => println!("{output}"),
        }

        Ok(EXIT_SUCCESS)
    }
}

fn report_failure(error: &ConversionError) -> i32 {
    eprintln!("❌ Conversion failed [{}]: {}", error.kind(), error.message());
    EXIT_CONVERSION_ERROR
}
