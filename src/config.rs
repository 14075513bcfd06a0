//! Runtime settings, loaded from YAML with every field defaulted.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    columns::DEFAULT_FUZZY_THRESHOLD,
    error::{Result, SheetError},
    loader::LoadOptions,
    persist::RetryPolicy,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Primary directory searched for spreadsheets.
    pub documents_dir: PathBuf,
    /// Directories searched after `documents_dir` for explicit references.
    pub fallback_dirs: Vec<PathBuf>,
    /// File name used when nothing in a command identifies a file.
    pub default_file: String,
    pub max_file_size: u64,
    pub fuzzy_threshold: f64,
    /// Extra attempts after a permission-denied replace.
    pub write_retries: u32,
    pub initial_backoff_ms: u64,
    pub cache_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("backend/documents"),
            fallback_dirs: vec![PathBuf::from("documents")],
            default_file: "sample-budget.csv".to_string(),
            max_file_size: LoadOptions::default().max_file_size,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            write_retries: 3,
            initial_backoff_ms: 500,
            cache_enabled: true,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_yaml::from_str(&raw).map_err(|err| SheetError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Settings rooted at `dir`, with no fallback directories.
    pub fn with_documents_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: dir.into(),
            fallback_dirs: Vec::new(),
            ..Self::default()
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_file_size: self.max_file_size,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.write_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "documents_dir: /srv/sheets\nwrite_retries: 1\n").expect("write");
        let settings = Settings::load(&path).expect("load");
        assert_eq!(settings.documents_dir, PathBuf::from("/srv/sheets"));
        assert_eq!(settings.write_retries, 1);
        assert_eq!(settings.default_file, "sample-budget.csv");
        assert_eq!(settings.fuzzy_threshold, 70.0);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "write_retries: [oops\n").expect("write");
        assert!(matches!(
            Settings::load(&path),
            Err(SheetError::Config { .. })
        ));
    }

    #[test]
    fn retry_policy_uses_backoff_millis() {
        let settings = Settings {
            initial_backoff_ms: 250,
            ..Settings::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(250));
    }
}
