use crate::utils::env_config::EnvConfig;
use anyhow::{anyhow, Context, Result};
use colored::*;
use openapi_processor::{process_document, ProcessingReport, ProcessorOptions, SpecLoader};
use permit_api::HttpPermitClient;
use tracing::info;

/// Arguments of `openapi apply`
#[derive(Debug, Clone)]
pub struct ApplyArgs {
    pub spec: String,
    pub base_url: Option<String>,
    pub auth_type: String,
    pub token_header: String,
    pub format: String,
}

/// Reconcile the annotations of an OpenAPI document with Permit
pub async fn apply(config: &EnvConfig, args: ApplyArgs) -> Result<()> {
    // Load before connecting so a bad spec never reaches the network
    let document = SpecLoader::load(&args.spec)
        .await
        .with_context(|| format!("Failed to load OpenAPI spec '{}'", args.spec))?;

    let client = HttpPermitClient::connect(config.client_config()?)
        .await
        .context("Failed to connect to the Permit API")?;
    info!(
        "Applying {} to project '{}', environment '{}'",
        args.spec,
        client.project(),
        client.environment()
    );

    let mut options = ProcessorOptions::default().with_auth(args.auth_type, args.token_header);
    options.base_url = args.base_url;

    let report = process_document(&client, &document, &options).await;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report_text(&args.spec, &report),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} error(s) while applying {}",
            report.errors.len(),
            args.spec
        ))
    }
}

fn print_report_text(spec: &str, report: &ProcessingReport) {
    println!("{}", "=== OpenAPI Sync Report ===".bold());
    println!();
    println!("{}: {}", "Spec".bold(), spec.cyan());
    println!(
        "{}: {}",
        "Completed".bold(),
        chrono::Utc::now().to_rfc3339()
    );
    println!("{}: {}ms", "Duration".bold(), report.execution_time_ms);
    println!();
    print!("{}", report.summarize());

    if !report.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".yellow().bold());
        for warning in &report.warnings {
            println!("  - {}", warning.yellow());
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("{}", "Errors:".red().bold());
        for error in &report.errors {
            println!("  - {}", error.red());
        }
    }

    println!();
    if report.is_success() {
        println!("{}", "Overall Status: OK".green().bold());
    } else {
        println!("{}", "Overall Status: PARTIAL".red().bold());
    }
}
