//! CLI integration tests
//!
//! These tests run the built binary against fixture schemas.

#![cfg(feature = "cli")]

mod common;

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn eudamed_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_eudamed-xml"))
}

fn run(args: &[&str]) -> Output {
    Command::new(eudamed_bin())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_cli_check_gmn() {
    let output = run(&["check", "gmn", "599302877PAY"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "599302877PAYU9");
}

#[test]
fn test_cli_check_gtin() {
    let output = run(&["check", "gtin", "0400638133393"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "04006381333931");
}

#[test]
fn test_cli_check_verify() {
    assert!(run(&["check", "gmn", "--verify", "599302677TAYU3"]).status.success());
    assert!(!run(&["check", "gtin", "--verify", "04006381333932"]).status.success());
}

#[test]
fn test_cli_check_invalid_length() {
    let output = run(&["check", "gmn", "ABCDE"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_paths() {
    let (_dir, schema) = common::device_schema();
    let output = run(&["inspect", schema.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "inspect should succeed");
    assert!(stdout.contains("MDRDevice [1..1] : MDRDeviceType"));
    assert!(stdout.contains("MDRDevice/MDRBasicUDI/riskClass [1..1]"));
    assert!(stdout.contains("MDRDevice/MDRUDIDIData [1..*]"));
}

#[test]
fn test_cli_inspect_unknown_root() {
    let (_dir, schema) = common::device_schema();
    let output = run(&["inspect", "--root", "Nope", schema.to_str().unwrap()]);
    assert!(!output.status.success());
}

// ============================================================================
// Generate Command Tests
// ============================================================================

#[test]
fn test_cli_generate_with_envelope() {
    let (dir, schema) = common::device_schema();
    let values = dir.path().join("values.json");
    fs::write(&values, common::DEVICE_VALUES).unwrap();
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        "[envelope]\nactor_code = \"BE-MF-000000001\"\nparty_id = \"party\"\n",
    )
    .unwrap();
    let out = dir.path().join("device.xml");

    let output = run(&[
        "generate",
        schema.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "--values",
        values.to_str().unwrap(),
        "--envelope",
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let xml = fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<m:Push"));
    assert!(xml.contains("BE-MF-000000001"));
    assert!(xml.contains("599302677TAYU3"));
}

#[test]
fn test_cli_generate_missing_group_is_unconstrained() {
    let (dir, schema) = common::device_schema();
    let values = dir.path().join("values.json");
    fs::write(&values, common::DEVICE_VALUES).unwrap();

    let output = run(&[
        "generate",
        schema.to_str().unwrap(),
        "--config-dir",
        dir.path().to_str().unwrap(),
        "--group",
        "implants",
        "--values",
        values.to_str().unwrap(),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<device:MDRDevice"));
    assert!(stdout.contains("CLASS_IIA"));
}

// ============================================================================
// Bulk and Regenerate Command Tests
// ============================================================================

#[test]
fn test_cli_bulk() {
    let (dir, schema) = common::device_schema();
    let values = dir.path().join("values.json");
    fs::write(&values, common::DEVICE_VALUES).unwrap();
    let rows = dir.path().join("rows.json");
    fs::write(
        &rows,
        r#"[{"dpt": "2", "cyl": "1", "pcode": "P2", "udi_di": "05993020000028"},
            {"dpt": "1", "cyl": "1", "pcode": "P1", "udi_di": "05993020000011"}]"#,
    )
    .unwrap();
    let out_dir = dir.path().join("bulk");

    let output = run(&[
        "bulk",
        schema.to_str().unwrap(),
        "--values",
        values.to_str().unwrap(),
        "--rows",
        rows.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let first = fs::read_to_string(out_dir.join("000_P1.xml")).unwrap();
    assert!(first.contains("05993020000011"));
    let second = fs::read_to_string(out_dir.join("001_P2.xml")).unwrap();
    assert!(second.contains("05993020000028"));
}

#[test]
fn test_cli_regenerate() {
    let (dir, schema) = common::device_schema();
    let values = dir.path().join("values.json");
    fs::write(&values, common::DEVICE_VALUES).unwrap();
    let input = dir.path().join("device.xml");
    let generated = run(&[
        "generate",
        schema.to_str().unwrap(),
        "--values",
        values.to_str().unwrap(),
        "-o",
        input.to_str().unwrap(),
    ]);
    assert!(generated.status.success());

    let output_path = dir.path().join("new.xml");
    let output = run(&[
        "regenerate",
        input.to_str().unwrap(),
        output_path.to_str().unwrap(),
        "--seed",
        "5",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Basic UDI-DI: 599302677TAYU3"));
    assert!(output_path.exists());

    let same = run(&["regenerate", input.to_str().unwrap(), input.to_str().unwrap()]);
    assert!(!same.status.success());
}
