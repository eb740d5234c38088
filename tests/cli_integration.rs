//! Integration tests for the `situ` command line.

use anyhow::Result;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn situ() -> Command {
    Command::new(env!("CARGO_BIN_EXE_situ"))
}

#[test]
fn test_help_lists_subcommands() -> Result<()> {
    let output = situ().arg("--help").output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["serve", "bridge", "follow"] {
        assert!(stdout.contains(subcommand), "missing {subcommand}: {stdout}");
    }
    Ok(())
}

#[test]
fn test_version() -> Result<()> {
    let output = situ().arg("--version").output()?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("situ "));
    Ok(())
}

#[test]
fn test_follow_requires_server_and_file() -> Result<()> {
    let output = situ().arg("follow").output()?;
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--server"), "{stderr}");
    Ok(())
}

#[test]
fn test_serve_fails_on_missing_root() -> Result<()> {
    let dir = TempDir::new()?;
    let output = situ()
        .current_dir(dir.path())
        .env("SITU_SERVER__PORT", "0")
        .args(["serve", "--no-bridge", "--root", "does-not-exist"])
        .output()?;
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Workspace root does not exist"), "{stderr}");
    Ok(())
}

#[test]
fn test_bad_config_file_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    let config = dir.path().join("situ.toml");
    fs::write(&config, "[server]\nport = \"eighty\"\n")?;

    let output = situ()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["serve", "--no-bridge"])
        .output()?;
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration"), "{stderr}");
    Ok(())
}
