#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv_enrich::{
    schema::Schema,
    store::{LoadOptions, RecordStore},
    table::Table,
};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Reference date used by every tenure assertion.
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// The three-row employee fixture loaded with the employee schema.
pub fn employees() -> Table {
    RecordStore::new(Schema::employees(), LoadOptions::default())
        .load_path(&fixture_path("employees.csv"))
        .expect("load employees fixture")
}

/// Loads `contents` with the employee schema.
pub fn load_employees_str(contents: &str) -> csv_enrich::error::Result<Table> {
    RecordStore::new(Schema::employees(), LoadOptions::default())
        .load(contents.as_bytes(), "inline")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
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
