//! Smoke tests for the seckit binary
//!
//! Every run uses the in-memory backend and a throwaway config file, so the
//! host keychain is never touched.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn seckit(temp_dir: &TempDir, args: &[&str]) -> Output {
    let config = temp_dir.path().join("config.json");
    if !config.exists() {
        fs::write(&config, r#"{"backend": "memory"}"#).expect("Failed to write config");
    }

    let output = Command::new(env!("CARGO_BIN_EXE_seckit"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .expect("Failed to execute command");

    if !output.status.success() {
        eprintln!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    output
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("secret"), "Help should mention 'secret' command");
    assert!(stdout.contains("key"), "Help should mention 'key' command");
}

/// Test that listing an empty service succeeds
#[test]
fn test_secret_list_empty() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["secret", "list", "--service", "x"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No secrets stored for x"));
}

#[test]
fn test_secret_add_with_data() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(
        &temp_dir,
        &["secret", "add", "--account", "foo", "--service", "bar", "--data", "hello"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Stored secret for foo in bar"));
}

#[test]
fn test_secret_get_missing_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(
        &temp_dir,
        &["secret", "get", "--account", "foo", "--service", "bar"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-25300"), "stderr should carry the status code");
}

#[test]
fn test_delete_nothing_is_not_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["secret", "delete", "--service", "bar", "--yes"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nothing to delete"));
}

#[test]
fn test_doctor_with_memory_backend() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["doctor"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("All checks passed"));
}

#[test]
fn test_key_create_prints_public_point() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["key", "create", "--tag", "com.example.smoke"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Public key"));
    assert!(stdout.contains("com.example.smoke"));
}

#[test]
fn test_key_get_missing_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["key", "get", "--tag", "com.example.absent"]);

    assert!(!output.status.success());
}

#[test]
fn test_key_sign_needs_digest_or_message() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = seckit(&temp_dir, &["key", "sign", "--tag", "com.example.smoke"]);

    assert!(!output.status.success());
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = Command::new(env!("CARGO_BIN_EXE_seckit"))
        .arg("--config")
        .arg(temp_dir.path().join("absent.json"))
        .args(["secret", "list", "--service", "x"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config"));
}

#[test]
fn test_doctor_writes_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("seckit").join("config.json");
    let output = Command::new(env!("CARGO_BIN_EXE_seckit"))
        .arg("--backend")
        .arg("memory")
        .arg("--config")
        .arg(&path)
        .args(["doctor", "--write-config"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let written = fs::read_to_string(&path).expect("config should be written");
    let parsed: serde_json::Value = serde_json::from_str(&written).expect("config is JSON");
    assert_eq!(parsed["data_protection_keychain"], serde_json::Value::Bool(true));
    assert!(parsed["sign_reason"].is_string());
}
