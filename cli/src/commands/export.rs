use crate::utils::env_config::EnvConfig;
use anyhow::{Context, Result};
use colored::*;
use permit_api::HttpPermitClient;
use std::path::PathBuf;
use terraform_export::{export_terraform, ExportOptions};

/// Write the current policy schema as Terraform HCL to `file` or stdout
pub async fn terraform(config: &EnvConfig, file: Option<PathBuf>) -> Result<()> {
    let client = HttpPermitClient::connect(config.client_config()?)
        .await
        .context("Failed to connect to the Permit API")?;

    let options = ExportOptions {
        api_url: config.api_url.clone(),
        ..ExportOptions::default()
    };
    let export = export_terraform(&client, &options)
        .await
        .context("Failed to export Terraform")?;

    let content = format!(
        "# Generated by permit export terraform\n# Project: {}, environment: {}, at {}\n\n{}",
        client.project(),
        client.environment(),
        chrono::Utc::now().to_rfc3339(),
        export.hcl
    );

    for warning in &export.warnings {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }

    match file {
        Some(path) => {
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} resource(s), {} role(s), {} resource role(s), {} relation(s), {} condition set(s) to {}",
                "Exported".green().bold(),
                export.resources,
                export.roles,
                export.resource_roles,
                export.relations,
                export.condition_sets,
                path.display()
            );
        }
        None => print!("{}", content),
    }

    Ok(())
}
