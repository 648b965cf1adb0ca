//! List templates command implementation

use super::{load_runtime_config, EXIT_CONFIG_ERROR, EXIT_CONVERSION_ERROR, EXIT_SUCCESS};
use crate::core::cancel::CancelSignal;
use crate::core::resolve::TemplateCollectionResolver;
use crate::domain::TemplateReference;
use clap::Args;

/// Arguments for the list-templates command
#[derive(Args, Debug)]
pub struct ListTemplatesArgs {
    /// Template collection reference; defaults to the built-in collection
    #[arg(short, long)]
    pub reference: Option<String>,

    /// Registry server to authenticate against; defaults to the reference's registry
    #[arg(long, default_value = "")]
    pub registry_server: String,
}

impl ListTemplatesArgs {
    /// Execute the list-templates command
    pub async fn execute(&self, config_path: &str, cancel: CancelSignal) -> anyhow::Result<i32> {
        let config = match load_runtime_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG_ERROR);
            }
        };

        let reference = self
            .reference
            .as_deref()
            .map(TemplateReference::new)
            .unwrap_or_else(TemplateReference::default_collection);

        let resolver = TemplateCollectionResolver::from_config(&config);
        let collection = match resolver
            .resolve(&reference, &self.registry_server, &cancel)
            .await
        {
            Ok(collection) => collection,
            Err(e) => {
                eprintln!("❌ Failed to resolve {reference} [{}]: {}", e.kind(), e.message());
                return Ok(EXIT_CONVERSION_ERROR);
            }
        };

        println!("📦 {reference}");
        println!(
            "   {} layer(s), {} template(s)",
            collection.layers().len(),
            collection.template_count()
        );
        println!();

        let last_layer = collection.layers().len().saturating_sub(1);
        for template in collection.effective_templates() {
            let defined_in = collection
                .layers()
                .iter()
                .rposition(|layer| layer.get(template.name()).is_some())
                .unwrap_or(last_layer);
            println!("  {:<40} layer {}", template.name(), defined_in + 1);
        }

        Ok(EXIT_SUCCESS)
    }
}
