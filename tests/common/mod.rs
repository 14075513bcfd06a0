#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use sheet_assist::config::Settings;
use tempfile::{TempDir, tempdir};

/// Payroll sheet whose `Base_Salary` column sums to 10000.
pub const PAYROLL_CSV: &str = "Employee_Name,Department,Base_Salary,Bonus\n\
Alice,Engineering,4000,400\n\
Bob,Marketing,3500,300\n\
Cara,Sales,2500,250\n";

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
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Settings rooted at this workspace with near-zero retry backoff.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::with_documents_dir(self.path());
        settings.initial_backoff_ms = 1;
        settings
    }

    /// File names in the workspace that start with `prefix`, sorted.
    pub fn files_starting_with(&self, prefix: &str) -> Vec<String> {
        let mut names = fs::read_dir(self.path())
            .expect("read workspace")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(prefix))
            .collect::<Vec<_>>();
        names.sort();
        names
    }
}
