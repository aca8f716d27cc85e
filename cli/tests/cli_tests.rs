use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ORDERS_SPEC: &str = r#"
openapi: 3.0.0
info:
  title: Orders
paths:
  /orders:
    x-permit-resource: Order
    get:
      summary: List orders
"#;

/// A `permit` command running in `dir` with no PERMIT_* variables inherited
fn permit(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("permit").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("PERMIT_API_KEY")
        .env_remove("PERMIT_API_URL")
        .env_remove("PERMIT_PROJECT")
        .env_remove("PERMIT_ENV")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Permit CLI"))
        .stdout(predicate::str::contains("openapi"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("permit"));
}

#[test]
fn test_subcommand_help() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .args(["openapi", "apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--spec"))
        .stdout(predicate::str::contains("--token-header"));

    permit(&dir)
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration management"));
}

#[test]
fn test_apply_requires_spec_argument() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .args(["openapi", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--spec"));
}

#[test]
fn test_apply_missing_spec_file() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .env("PERMIT_API_KEY", "permit_key_test")
        .env("PERMIT_PROJECT", "default")
        .env("PERMIT_ENV", "dev")
        .args(["openapi", "apply", "--spec", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_apply_without_api_key() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("openapi.yaml"), ORDERS_SPEC).unwrap();

    permit(&dir)
        .args(["openapi", "apply", "--spec", "openapi.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}

#[test]
fn test_export_rejects_invalid_api_url() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .args([
            "--api-key",
            "permit_key_test",
            "--api-url",
            "ftp://api.permit.io",
            "export",
            "terraform",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API URL must start with http"));
}

#[test]
fn test_config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .env("PERMIT_API_KEY", "permit_key_supersecret1234")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Permit Configuration"))
        .stdout(predicate::str::contains("****1234"))
        .stdout(predicate::str::contains("supersecret").not());
}

#[test]
fn test_config_show_json_defaults() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"api_url\": \"https://api.permit.io\""))
        .stdout(predicate::str::contains("\"api_key\": null"));
}

#[test]
fn test_config_show_reads_dotenv() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        "PERMIT_PROJECT=from-dotenv\nPERMIT_ENV=staging\n",
    )
    .unwrap();

    permit(&dir)
        .args(["config", "show", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project: from-dotenv"))
        .stdout(predicate::str::contains("environment: staging"));
}

#[test]
fn test_flags_override_environment() {
    let dir = TempDir::new().unwrap();

    permit(&dir)
        .env("PERMIT_PROJECT", "from-env")
        .args(["--project", "from-flag", "config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from-flag"))
        .stdout(predicate::str::contains("from-env").not());
}
