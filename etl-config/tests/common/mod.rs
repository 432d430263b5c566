//! Shared helpers for integration tests
#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary configuration directory that is removed on drop.
pub struct ConfigFixture {
    dir: TempDir,
}

impl ConfigFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` as pretty JSON to `name`, creating parent directories.
    pub fn write_json(&self, name: &str, content: &Value) -> PathBuf {
        let text = serde_json::to_string_pretty(content).expect("Failed to serialize fixture");
        self.write_raw(name, &text)
    }

    pub fn write_raw(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create fixture directory");
        }
        fs::write(&path, content).expect("Failed to write fixture");
        path
    }

    /// `name` inside the fixture, as the string stored in resolved paths.
    pub fn display(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }
}
