//! Relative file names and directories are qualified against the working
//! directory when a configuration is created.

mod common;

use common::ConfigFixture;
use etl_config::{ConfigOptions, Configuration, EtlConfigOptions, EtlConfiguration};
use serde_json::json;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

/// Changes into the fixture directory and restores the previous working
/// directory on drop.
struct WorkingDirectory {
    original: PathBuf,
}

impl WorkingDirectory {
    fn enter(fixture: &ConfigFixture) -> Self {
        let original = env::current_dir().expect("Failed to get current dir");
        env::set_current_dir(fixture.path()).expect("Failed to set current dir");
        Self { original }
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.original);
    }
}

#[test]
#[serial]
fn test_relative_filename_is_qualified() {
    let fixture = ConfigFixture::new();
    fixture.write_json("conf/b.json", &json!({"x": [7]}));
    fixture.write_json(
        "conf/etl.json",
        &json!({
            "paths": {"data_dir": "../data"},
            "ingestors": [{"name": "a", "enabled": true, "value": {"$ref": "b.json#/x/0"}}]
        }),
    );

    let _cwd = WorkingDirectory::enter(&fixture);
    let cwd = env::current_dir().unwrap();

    let config = EtlConfiguration::load("./conf/../conf/etl.json", EtlConfigOptions::new()).unwrap();
    assert_eq!(config.filename(), cwd.join("conf/etl.json"));
    assert_eq!(config.core().base_dir(), cwd.join("conf"));
    assert_eq!(
        config.paths().unwrap()["data_dir"],
        json!(cwd.join("data").to_string_lossy())
    );
    assert_eq!(
        config.action_options("a", None).unwrap().property("value"),
        Some(&json!(7))
    );
}

#[test]
#[serial]
fn test_relative_base_dir_option() {
    let fixture = ConfigFixture::new();
    fixture.write_json("shared/b.json", &json!({"x": "shared value"}));
    fixture.write_json(
        "conf/etl.json",
        &json!({
            "paths": {},
            "ingestors": [{"name": "a", "enabled": true, "value": {"$ref": "b.json#/x"}}]
        }),
    );

    let _cwd = WorkingDirectory::enter(&fixture);
    let cwd = env::current_dir().unwrap();

    let options = EtlConfigOptions::new().with_base(ConfigOptions::new().with_base_dir("shared"));
    let config = EtlConfiguration::load("conf/etl.json", options).unwrap();
    assert_eq!(config.core().base_dir(), cwd.join("shared"));
    assert_eq!(
        config.action_options("a", None).unwrap().property("value"),
        Some(&json!("shared value"))
    );
}
