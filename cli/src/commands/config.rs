use crate::utils::env_config::{ConfigView, EnvConfig};
use anyhow::Result;
use colored::*;

/// Show the resolved connection settings
pub fn show(config: &EnvConfig, format: &str) -> Result<()> {
    let view = config.view();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&view)?),
        "yaml" => print!("{}", serde_yaml::to_string(&view)?),
        _ => print_config_text(&view),
    }

    Ok(())
}

fn print_config_text(view: &ConfigView) {
    println!("{}", "=== Permit Configuration ===".bold());
    println!();
    print_value("API URL", Some(&view.api_url));
    print_value("API key", view.api_key.as_ref());
    print_value("Project", view.project.as_ref());
    print_value("Environment", view.environment.as_ref());
}

fn print_value(label: &str, value: Option<&String>) {
    match value {
        Some(value) => println!("{}: {}", label.bold(), value.cyan()),
        None => println!("{}: {}", label.bold(), "(not set)".yellow()),
    }
}
