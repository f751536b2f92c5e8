#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sheet_mapper::{CanonicalRecord, FieldValue};
use tempfile::{TempDir, tempdir};

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

pub const KEY: &str = "registration_number";

/// A vehicle record carrying only a registration number.
pub fn vehicle(key: &str) -> CanonicalRecord {
    let mut record = CanonicalRecord::new();
    record.set(KEY, Some(FieldValue::Text(key.to_string())));
    record
}

pub fn keys(records: &[CanonicalRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.text(KEY).unwrap_or_default())
        .collect()
}
