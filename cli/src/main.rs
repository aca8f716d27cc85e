use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::{config, export, openapi};
use openapi_processor::{DEFAULT_AUTH_TYPE, DEFAULT_TOKEN_HEADER};
use utils::env_config::{ConfigOverrides, EnvConfig};

/// Permit CLI - Sync OpenAPI x-permit annotations with Permit.io
#[derive(Parser)]
#[command(name = "permit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Permit API key
    #[arg(long, env = "PERMIT_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Permit API base URL
    #[arg(long, env = "PERMIT_API_URL", global = true)]
    api_url: Option<String>,

    /// Project key or id (resolved from the API key when omitted)
    #[arg(long, env = "PERMIT_PROJECT", global = true)]
    project: Option<String>,

    /// Environment key or id (resolved from the API key when omitted)
    #[arg(long, env = "PERMIT_ENV", global = true)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply x-permit-* annotations from an OpenAPI spec
    Openapi {
        #[command(subcommand)]
        action: OpenapiAction,
    },

    /// Export the current policy schema
    Export {
        #[command(subcommand)]
        action: ExportAction,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum OpenapiAction {
    /// Create resources, actions, roles, relations and URL mappings
    Apply {
        /// OpenAPI spec file path or http(s) URL
        #[arg(short, long)]
        spec: String,

        /// Prefix for mapped URLs (defaults to the spec's first server URL)
        #[arg(long)]
        base_url: Option<String>,

        /// Auth type sent with the URL mappings
        #[arg(long, default_value = DEFAULT_AUTH_TYPE)]
        auth_type: String,

        /// Header the PDP reads the caller token from
        #[arg(long, default_value = DEFAULT_TOKEN_HEADER)]
        token_header: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum ExportAction {
    /// Render Terraform HCL for the permitio provider
    Terraform {
        /// Write to this file instead of stdout
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the resolved configuration (API key masked)
    Show {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env_config = EnvConfig::load(ConfigOverrides {
        api_key: cli.api_key,
        api_url: cli.api_url,
        project: cli.project,
        environment: cli.environment,
    })?;

    // Execute the command
    match cli.command {
        Commands::Openapi { action } => match action {
            OpenapiAction::Apply {
                spec,
                base_url,
                auth_type,
                token_header,
                format,
            } => {
                let args = openapi::ApplyArgs {
                    spec,
                    base_url,
                    auth_type,
                    token_header,
                    format,
                };
                openapi::apply(&env_config, args).await?;
            }
        },
        Commands::Export { action } => match action {
            ExportAction::Terraform { file } => {
                export::terraform(&env_config, file).await?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                config::show(&env_config, &format)?;
            }
        },
    }

    Ok(())
}
