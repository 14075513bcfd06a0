//! Safe persistence of an updated dataset.
//!
//! A backup is copied next to the target and verified by SHA-256 before
//! anything is written. The dataset is then serialized into a temporary
//! file in the target's directory and moved over the target through a
//! [`FileReplacer`]. When the target stays locked after the configured
//! retries, the temporary file is kept under a `<stem>_updated_<ts>` name
//! instead and the caller gets [`WriteOutcome::WrittenToFallback`].

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::Utc;
use log::{debug, info, warn};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempPath};

use crate::{
    data::Cell,
    dataset::{Dataset, SourceFormat},
    error::{Result, SheetError, WriteError},
    io_utils,
};

/// Moves a fully written temporary file over the target.
pub trait FileReplacer: Send + Sync {
    fn replace(&self, source: &Path, target: &Path) -> io::Result<()>;
}

/// Replaces the target with an atomic rename.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameReplacer;

impl FileReplacer for RenameReplacer {
    fn replace(&self, source: &Path, target: &Path) -> io::Result<()> {
        fs::rename(source, target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first permission-denied failure.
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based); doubles each time.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// The target stayed locked through every retry.
    PermissionDenied,
    /// The source format (XLS, ODS) cannot be written back natively.
    UnwritableFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    ReplacedInPlace(PathBuf),
    WrittenToFallback { path: PathBuf, reason: FallbackReason },
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::ReplacedInPlace(path) => path.as_path(),
            WriteOutcome::WrittenToFallback { path, .. } => path.as_path(),
        }
    }

    pub fn is_in_place(&self) -> bool {
        matches!(self, WriteOutcome::ReplacedInPlace(_))
    }

    pub fn update_type(&self) -> &'static str {
        if self.is_in_place() {
            "in_place"
        } else {
            "new_file"
        }
    }
}

/// `<dir>/<stem>_<label>_<unix_ts><extension>`. When that name is taken
/// within the same second, `_2`, `_3`, ... is appended to the timestamp so
/// the stamp always reflects when the file was written.
pub fn timestamped_path(target: &Path, label: &str, extension: &str) -> PathBuf {
    let dir = parent_dir(target);
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spreadsheet".to_string());
    let timestamp = Utc::now().timestamp();
    let base = dir.join(format!("{stem}_{label}_{timestamp}{extension}"));
    if !base.exists() {
        return base;
    }
    (2u32..)
        .map(|n| dir.join(format!("{stem}_{label}_{timestamp}_{n}{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Copies `target` to a fresh `<stem>_backup_<ts><ext>` file and checks the
/// copy's digest against the original.
pub fn create_backup(target: &Path) -> Result<PathBuf> {
    let backup_error = |reason: String| SheetError::Backup {
        path: target.to_path_buf(),
        reason,
    };
    let backup = timestamped_path(target, "backup", &io_utils::dotted_extension(target));
    fs::copy(target, &backup).map_err(|e| backup_error(e.to_string()))?;

    let original = file_digest(target).map_err(|e| backup_error(e.to_string()))?;
    let copied = file_digest(&backup).map_err(|e| backup_error(e.to_string()))?;
    if original != copied {
        let _ = fs::remove_file(&backup);
        return Err(backup_error(format!(
            "checksum mismatch between {target:?} and {backup:?}"
        )));
    }
    info!("Created backup {backup:?}");
    Ok(backup)
}

fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

/// Writes `dataset` to `target` with retry and fallback naming.
pub fn commit(
    dataset: &Dataset,
    target: &Path,
    replacer: &dyn FileReplacer,
    policy: &RetryPolicy,
) -> std::result::Result<WriteOutcome, WriteError> {
    let dir = parent_dir(target);
    if matches!(dataset.source(), SourceFormat::Xls | SourceFormat::Ods) {
        let temp = temp_file_in(&dir, ".xlsx")?;
        write_xlsx(dataset, temp.path())?;
        let fallback = timestamped_path(target, "updated", ".xlsx");
        persist_fallback(temp.into_temp_path(), &fallback)?;
        warn!(
            "{} cannot be written natively; saved {fallback:?}",
            dataset.source().label()
        );
        return Ok(WriteOutcome::WrittenToFallback {
            path: fallback,
            reason: FallbackReason::UnwritableFormat,
        });
    }

    let extension = io_utils::dotted_extension(target);
    let temp = temp_file_in(&dir, &extension)?;
    serialize_into(dataset, &temp)?;
    let temp_path = temp.into_temp_path();
    clear_readonly(target);

    let mut attempt = 0;
    loop {
        match replacer.replace(&temp_path, target) {
            Ok(()) => {
                // The temporary path now names the target.
                let _ = temp_path.keep();
                info!("Updated {target:?} in place");
                return Ok(WriteOutcome::ReplacedInPlace(target.to_path_buf()));
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                if attempt < policy.retries {
                    let delay = policy.delay(attempt);
                    warn!(
                        "Permission denied replacing {target:?}; retry {} of {} in {delay:?}",
                        attempt + 1,
                        policy.retries
                    );
                    thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                let fallback = timestamped_path(target, "updated", &extension);
                persist_fallback(temp_path, &fallback)?;
                warn!("{target:?} is locked; wrote {fallback:?} instead");
                return Ok(WriteOutcome::WrittenToFallback {
                    path: fallback,
                    reason: FallbackReason::PermissionDenied,
                });
            }
            Err(source) => {
                return Err(WriteError::Replace {
                    path: target.to_path_buf(),
                    source,
                });
            }
        }
    }
}

/// Writes `dataset` straight to `path` as CSV or XLSX, picked by extension.
/// CSV output uses the dataset's source delimiter and encoding when it was
/// read from CSV.
pub fn save_dataset(dataset: &Dataset, path: &Path) -> std::result::Result<(), WriteError> {
    if io_utils::dotted_extension(path) == ".xlsx" {
        return write_xlsx(dataset, path);
    }
    let file = File::create(path).map_err(|e| serialize_error(path, e))?;
    write_csv(dataset, file, path)
}

fn serialize_into(dataset: &Dataset, temp: &NamedTempFile) -> std::result::Result<(), WriteError> {
    match dataset.source() {
        SourceFormat::Csv { .. } => {
            let file = temp.reopen().map_err(|e| serialize_error(temp.path(), e))?;
            write_csv(dataset, file, temp.path())
        }
        _ => write_xlsx(dataset, temp.path()),
    }
}

fn write_csv(dataset: &Dataset, file: File, path: &Path) -> std::result::Result<(), WriteError> {
    let (delimiter, encoding) = match dataset.source() {
        SourceFormat::Csv {
            delimiter,
            encoding,
        } => (delimiter, encoding),
        _ => (b',', encoding_rs::UTF_8),
    };
    let mut writer = io_utils::open_csv_writer(file, delimiter, encoding);
    writer
        .write_record(dataset.headers())
        .map_err(|e| serialize_error(path, e))?;
    for row in dataset.display_rows() {
        writer
            .write_record(&row)
            .map_err(|e| serialize_error(path, e))?;
    }
    writer.flush().map_err(|e| serialize_error(path, e))?;
    debug!("Wrote {} row(s) to {path:?}", dataset.row_count());
    Ok(())
}

fn write_xlsx(dataset: &Dataset, path: &Path) -> std::result::Result<(), WriteError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (col_idx, column) in dataset.columns().iter().enumerate() {
        let col = u16::try_from(col_idx).map_err(|e| serialize_error(path, e))?;
        sheet
            .write_string_with_format(0, col, &column.name, &header_format)
            .map_err(|e| serialize_error(path, e))?;
        for (row_idx, cell) in column.cells.iter().enumerate() {
            let row = u32::try_from(row_idx + 1).map_err(|e| serialize_error(path, e))?;
            match cell {
                Cell::Empty => {}
                Cell::Number(value) => {
                    sheet
                        .write_number(row, col, *value)
                        .map_err(|e| serialize_error(path, e))?;
                }
                Cell::Text(text) => {
                    sheet
                        .write_string(row, col, text)
                        .map_err(|e| serialize_error(path, e))?;
                }
            }
        }
    }
    workbook.save(path).map_err(|e| serialize_error(path, e))?;
    debug!("Wrote workbook {path:?}");
    Ok(())
}

fn serialize_error(path: &Path, err: impl ToString) -> WriteError {
    WriteError::Serialize {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn temp_file_in(dir: &Path, suffix: &str) -> std::result::Result<NamedTempFile, WriteError> {
    tempfile::Builder::new()
        .prefix(".sheet-assist-")
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|source| WriteError::TempFile {
            dir: dir.to_path_buf(),
            source,
        })
}

fn persist_fallback(temp: TempPath, fallback: &Path) -> std::result::Result<(), WriteError> {
    temp.persist(fallback).map_err(|err| WriteError::Fallback {
        path: fallback.to_path_buf(),
        source: err.error,
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn clear_readonly(path: &Path) {
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    permissions.set_readonly(false);
    if let Err(err) = fs::set_permissions(path, permissions) {
        debug!("Could not clear read-only flag on {path:?}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use encoding_rs::UTF_8;
    use tempfile::tempdir;

    use super::*;
    use crate::loader::{LoadOptions, load_dataset};

    struct LockedReplacer {
        calls: AtomicUsize,
        kind: io::ErrorKind,
    }

    impl LockedReplacer {
        fn new(kind: io::ErrorKind) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                kind,
            }
        }
    }

    impl FileReplacer for LockedReplacer {
        fn replace(&self, _source: &Path, _target: &Path) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(self.kind, "target is locked"))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn write_budget(dir: &Path) -> PathBuf {
        let path = dir.join("budget.csv");
        fs::write(&path, "Name;Base_Salary\nAnn;4000\nBob;6000\n").expect("write csv");
        path
    }

    #[test]
    fn delay_doubles_from_initial_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
    }

    #[test]
    fn consecutive_backups_are_distinct_and_identical() {
        let dir = tempdir().expect("temp dir");
        let target = write_budget(dir.path());
        let first = create_backup(&target).expect("first backup");
        let second = create_backup(&target).expect("second backup");
        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), fs::read(&target).unwrap());
        assert_eq!(fs::read(&second).unwrap(), fs::read(&target).unwrap());
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("budget_backup_") && name.ends_with(".csv"));
    }

    #[test]
    fn same_second_backups_keep_the_current_timestamp() {
        let dir = tempdir().expect("temp dir");
        let target = write_budget(dir.path());
        let before = Utc::now().timestamp();
        let backups = (0..3)
            .map(|_| create_backup(&target).expect("backup"))
            .collect::<Vec<_>>();
        let after = Utc::now().timestamp();
        for backup in &backups {
            let name = backup.file_stem().unwrap().to_string_lossy().into_owned();
            let stamp: i64 = name
                .trim_start_matches("budget_backup_")
                .split('_')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            assert!((before..=after).contains(&stamp), "{name} is stamped outside the write window");
        }
        let mut distinct = backups.clone();
        distinct.dedup();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let dir = tempdir().expect("temp dir");
        assert!(matches!(
            create_backup(&dir.path().join("absent.csv")),
            Err(SheetError::Backup { .. })
        ));
    }

    #[test]
    fn commit_replaces_csv_keeping_delimiter() {
        let dir = tempdir().expect("temp dir");
        let target = write_budget(dir.path());
        let mut dataset = load_dataset(&target, &LoadOptions::default()).expect("load");
        dataset.map_numbers("Base_Salary", |v| v * 2.0);

        let outcome = commit(&dataset, &target, &RenameReplacer, &fast_policy()).expect("commit");
        assert_eq!(outcome, WriteOutcome::ReplacedInPlace(target.clone()));
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "Name;Base_Salary\nAnn;8000\nBob;12000\n"
        );
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".sheet-assist-"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn locked_target_falls_back_after_retries() {
        let dir = tempdir().expect("temp dir");
        let target = write_budget(dir.path());
        let original = fs::read(&target).unwrap();
        let dataset = load_dataset(&target, &LoadOptions::default()).expect("load");
        let replacer = LockedReplacer::new(io::ErrorKind::PermissionDenied);

        let outcome = commit(&dataset, &target, &replacer, &fast_policy()).expect("commit");
        assert_eq!(replacer.calls.load(Ordering::SeqCst), 4);
        match &outcome {
            WriteOutcome::WrittenToFallback { path, reason } => {
                assert_eq!(*reason, FallbackReason::PermissionDenied);
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                assert!(name.starts_with("budget_updated_"));
                let reloaded = load_dataset(path, &LoadOptions::default()).expect("reload");
                assert_eq!(reloaded.row_count(), 2);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert_eq!(outcome.update_type(), "new_file");
        assert_eq!(fs::read(&target).unwrap(), original);
    }

    #[test]
    fn other_replace_errors_are_reported() {
        let dir = tempdir().expect("temp dir");
        let target = write_budget(dir.path());
        let dataset = load_dataset(&target, &LoadOptions::default()).expect("load");
        let replacer = LockedReplacer::new(io::ErrorKind::Other);
        assert!(matches!(
            commit(&dataset, &target, &replacer, &fast_policy()),
            Err(WriteError::Replace { .. })
        ));
        assert_eq!(replacer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ods_source_is_written_as_xlsx_fallback() {
        let dir = tempdir().expect("temp dir");
        let target = dir.path().join("projects.ods");
        let dataset = Dataset::from_text_rows(
            vec!["Project".into(), "Budget".into()],
            vec![
                vec!["Atlas".into(), "1200".into()],
                vec!["Borealis".into(), "800".into()],
            ],
            SourceFormat::Ods,
        );
        let outcome = commit(&dataset, &target, &RenameReplacer, &fast_policy()).expect("commit");
        let WriteOutcome::WrittenToFallback { path, reason } = outcome else {
            panic!("expected fallback");
        };
        assert_eq!(reason, FallbackReason::UnwritableFormat);
        assert_eq!(io_utils::dotted_extension(&path), ".xlsx");
        let reloaded = load_dataset(&path, &LoadOptions::default()).expect("reload");
        assert_eq!(reloaded.column("Budget").unwrap().sum(), 2000.0);
    }

    #[test]
    fn save_dataset_writes_utf8_csv_for_workbook_sources() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        let dataset = Dataset::from_text_rows(
            vec!["a".into(), "b".into()],
            vec![vec!["x, y".into(), "2".into()]],
            SourceFormat::Xlsx,
        );
        save_dataset(&dataset, &path).expect("save");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n\"x, y\",2\n");
        let reloaded = load_dataset(&path, &LoadOptions::default()).expect("reload");
        assert_eq!(
            reloaded.source(),
            SourceFormat::Csv {
                delimiter: b',',
                encoding: UTF_8
            }
        );
    }
}
