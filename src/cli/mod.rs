//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for FHIR Bridge using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// FHIR Bridge - template-driven HL7v2 and JSON to FHIR conversion
#[derive(Parser, Debug)]
#[command(name = "fhir-bridge")]
#[command(version, about, long_about = None)]
#[command(author = "FHIR Bridge Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = commands::DEFAULT_CONFIG_PATH,
        env = "FHIR_BRIDGE_CONFIG"
    )]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FHIR_BRIDGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert one message using a template collection
    Convert(commands::convert::ConvertArgs),

    /// List the templates of a template collection
    ListTemplates(commands::list_templates::ListTemplatesArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
