//! Binary tests for the etl-config command.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_pipeline(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir.join("etl.d")).unwrap();
    fs::write(
        dir.join("etl.json"),
        serde_json::to_string_pretty(&json!({
            "paths": {},
            "defaults": {"ingestors": {"enabled": true}},
            "ingestors": [{"name": "jobs"}, {"name": "storage", "enabled": false}]
        }))
        .unwrap(),
    )
    .unwrap();
    fs::write(
        dir.join("etl.d/cloud.json"),
        r#"{"ingestors": [{"name": "cloud", "endpoints": {"source": {"type": "jsonfile", "name": "Cloud", "path": "cloud.json"}}}]}"#,
    )
    .unwrap();
    dir.join("etl.json")
}

fn etl_config() -> Command {
    Command::cargo_bin("etl-config").unwrap()
}

#[test]
fn test_resolve_prints_sections() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_pipeline(temp_dir.path());

    etl_config()
        .arg("resolve")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("ingestors"))
        .stdout(predicate::str::contains("cloud"))
        .stdout(predicate::str::contains("storage"))
        .stdout(predicate::str::contains("1 data endpoints"));
}

#[test]
fn test_action_prints_json() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_pipeline(temp_dir.path());

    let output = etl_config()
        .args(["action"])
        .arg(&file)
        .args(["cloud", "--section", "ingestors", "-o", "batch=25"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "cloud");
    assert_eq!(value["enabled"], true);
    assert_eq!(value["batch"], 25);
    assert!(value["source"].is_string());
}

#[test]
fn test_dump_omits_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_pipeline(temp_dir.path());

    let output = etl_config().arg("dump").arg(&file).output().unwrap();
    assert!(output.status.success());

    let document: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(document.get("defaults").is_none());
    assert_eq!(document["ingestors"].as_array().unwrap().len(), 3);
}

#[test]
fn test_endpoints_table() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_pipeline(temp_dir.path());

    etl_config()
        .arg("endpoints")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Cloud"))
        .stdout(predicate::str::contains("jsonfile"));
}

#[test]
fn test_resolution_error_exits_with_one() {
    let temp_dir = TempDir::new().unwrap();

    etl_config()
        .arg("resolve")
        .arg(temp_dir.path().join("missing.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn test_duplicate_local_action_exits_with_one() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_pipeline(temp_dir.path());
    fs::write(
        temp_dir.path().join("etl.d/dup.json"),
        r#"{"ingestors": [{"name": "jobs"}]}"#,
    )
    .unwrap();

    etl_config()
        .arg("resolve")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("jobs"))
        .stderr(predicate::str::contains("dup.json"));
}

#[test]
fn test_ambiguous_action_exits_with_one() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("etl.json");
    fs::write(
        &file,
        r#"{"paths": {}, "ingestors": [{"name": "x"}], "aggregators": [{"name": "x"}]}"#,
    )
    .unwrap();

    etl_config()
        .arg("action")
        .arg(&file)
        .arg("x")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ingestors"));
}
