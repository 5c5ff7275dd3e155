#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_reconcile::{Dataset, data::Value};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Builds a dataset with an explicit column order.
pub fn dataset(columns: &[&str], rows: Vec<Vec<Option<Value>>>) -> Dataset {
    Dataset::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
        .expect("valid dataset")
}

pub fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}

pub fn float(value: f64) -> Option<Value> {
    Some(Value::Float(value))
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

pub fn key(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
