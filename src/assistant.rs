//! The pipeline behind the external calls: locate a file, load it, classify
//! the command, then either aggregate or update and persist.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{info, warn};
use serde::Serialize;

use crate::{
    analysis::{self, AnalysisOutcome},
    cache::{DatasetCache, MemoryCache, NoCache},
    columns::{self, MatchKind},
    config::Settings,
    data::Cell,
    dataset::Dataset,
    error::Result,
    intent::{self, CommandIntent},
    loader,
    locate::FileLocator,
    operations::{self, AggregateOp, OperationChange, OperationRequest, UpdateOperation},
    params,
    persist::{self, FallbackReason, FileReplacer, RenameReplacer, WriteOutcome},
    summary::{FileInfo, format_amount},
    update::{self, UpdateRecord},
};

/// Response of [`Assistant::smart_file_operation`].
#[derive(Debug, Clone, Serialize)]
pub struct SmartResponse {
    pub file_analyzed: String,
    pub file_info: FileInfo,
    pub command_processed: String,
    pub operation_type: CommandIntent,
    #[serde(flatten)]
    pub outcome: OperationOutcome,
    pub insights: Vec<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationOutcome {
    Analysis(AnalysisOutcome),
    Update(UpdateReport),
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub operation: &'static str,
    pub file_updated: String,
    pub backup_created: String,
    pub update_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub updates_made: BTreeMap<String, UpdateRecord>,
    pub recomputed_totals: Vec<String>,
    pub rows_affected: usize,
    pub message: String,
}

/// Response of [`Assistant::update_spreadsheet`].
#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetUpdateResponse {
    pub operation: UpdateOperation,
    pub input_file: String,
    pub output_file: String,
    pub backup_file: String,
    pub rows_updated: usize,
    pub columns: Vec<String>,
    pub changes_applied: OperationChange,
    pub update_type: &'static str,
}

/// Response of [`Assistant::analyze_column`].
#[derive(Debug, Clone, Serialize)]
pub struct ColumnAnalysis {
    pub result: f64,
    pub matched_column: String,
    pub match_kind: MatchKind,
    pub cells_count: usize,
    pub operation: AggregateOp,
    pub total_rows: usize,
    pub total_columns: usize,
}

pub struct Assistant {
    settings: Settings,
    locator: FileLocator,
    cache: Arc<dyn DatasetCache>,
    replacer: Arc<dyn FileReplacer>,
}

impl Assistant {
    pub fn new(settings: Settings) -> Self {
        let cache: Arc<dyn DatasetCache> = if settings.cache_enabled {
            Arc::new(MemoryCache::new())
        } else {
            Arc::new(NoCache)
        };
        Self {
            locator: FileLocator::new(&settings),
            settings,
            cache,
            replacer: Arc::new(RenameReplacer),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn DatasetCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Swaps the strategy used to move the written file over the target.
    pub fn with_replacer(mut self, replacer: Arc<dyn FileReplacer>) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn locate(&self, command: &str, file_reference: Option<&str>) -> PathBuf {
        self.locator.locate(command, file_reference)
    }

    /// Interprets `command` against the file it refers to (or
    /// `file_reference` when given) and returns analysis results or the
    /// outcome of an in-place update.
    pub fn smart_file_operation(
        &self,
        command: &str,
        file_reference: Option<&str>,
    ) -> Result<SmartResponse> {
        let path = self.locate(command, file_reference);
        let intent = intent::classify(command);
        info!("Processing '{command}' as {intent} against {path:?}");

        let (file_info, outcome, insights) = if intent.is_update() {
            self.command_update(&path, command)?
        } else {
            let dataset = self.load_cached(&path)?;
            let file_info = file_info(&path, &dataset)?;
            let analysis =
                analysis::analyze(intent, &dataset, command, self.settings.fuzzy_threshold)?;
            (
                file_info,
                OperationOutcome::Analysis(analysis.outcome),
                analysis.insights,
            )
        };

        Ok(SmartResponse {
            file_analyzed: display_path(&path),
            file_info,
            command_processed: command.to_string(),
            operation_type: intent,
            outcome,
            insights,
            success: true,
        })
    }

    fn command_update(
        &self,
        path: &Path,
        command: &str,
    ) -> Result<(FileInfo, OperationOutcome, Vec<String>)> {
        let mut dataset = loader::load_dataset(path, &self.settings.load_options())?;
        let file_info = file_info(path, &dataset)?;
        let adjustment = params::extract(command);
        let applied = update::apply_command_update(
            &mut dataset,
            command,
            &adjustment,
            self.settings.fuzzy_threshold,
        )?;

        let backup = persist::create_backup(path)?;
        let outcome = self.persist(&dataset, path)?;

        let mut insights: Vec<String> = applied
            .updates
            .iter()
            .map(|(column, record)| {
                let mut line = format!(
                    "{column}: {} -> {}",
                    format_amount(column, record.original_total),
                    format_amount(column, record.new_total)
                );
                if let Some(pct) = record.percentage_change {
                    line.push_str(&format!(" ({pct:+.2}%)"));
                }
                line
            })
            .collect();
        insights.extend(
            applied
                .recomputed_totals
                .iter()
                .map(|total| format!("Recomputed {total} from its components")),
        );
        insights.push(format!("Backup saved to {}", display_path(&backup)));

        let name = file_name(path);
        let message = match &outcome {
            WriteOutcome::ReplacedInPlace(_) => format!(
                "Updated {} column(s) in {name}",
                applied.updates.len()
            ),
            WriteOutcome::WrittenToFallback { path: fallback, .. } => {
                let note = format!(
                    "{name} could not be replaced; changes saved to {}",
                    file_name(fallback)
                );
                insights.push(note.clone());
                note
            }
        };

        let report = UpdateReport {
            operation: "intelligent_file_update",
            file_updated: display_path(outcome.path()),
            backup_created: display_path(&backup),
            update_type: outcome.update_type(),
            fallback_reason: match &outcome {
                WriteOutcome::ReplacedInPlace(_) => None,
                WriteOutcome::WrittenToFallback { reason, .. } => Some(*reason),
            },
            updates_made: applied.updates,
            recomputed_totals: applied.recomputed_totals,
            rows_affected: dataset.row_count(),
            message,
        };
        Ok((file_info, OperationOutcome::Update(report), insights))
    }

    /// Applies a named operation to the spreadsheet at `path`, backing it up
    /// and writing the result back in place when possible.
    pub fn update_spreadsheet(
        &self,
        path: &Path,
        operation: UpdateOperation,
        request: &OperationRequest,
    ) -> Result<SpreadsheetUpdateResponse> {
        let mut dataset = loader::load_dataset(path, &self.settings.load_options())?;
        let changes_applied = operations::apply_operation(&mut dataset, operation, request)?;
        let backup = persist::create_backup(path)?;
        let outcome = self.persist(&dataset, path)?;
        Ok(SpreadsheetUpdateResponse {
            operation,
            input_file: display_path(path),
            output_file: display_path(outcome.path()),
            backup_file: display_path(&backup),
            rows_updated: dataset.row_count(),
            columns: dataset.header_names(),
            changes_applied,
            update_type: outcome.update_type(),
        })
    }

    fn persist(&self, dataset: &Dataset, path: &Path) -> Result<WriteOutcome> {
        let outcome = persist::commit(
            dataset,
            path,
            self.replacer.as_ref(),
            &self.settings.retry_policy(),
        )?;
        self.cache.invalidate(path);
        if !outcome.is_in_place() {
            warn!("Result for {path:?} written to {:?}", outcome.path());
        }
        Ok(outcome)
    }

    pub fn analyze_column(
        &self,
        path: &Path,
        operation: AggregateOp,
        column: &str,
    ) -> Result<ColumnAnalysis> {
        let dataset = self.load_cached(path)?;
        let matched = columns::resolve_column(&dataset, column, self.settings.fuzzy_threshold)?;
        let result = operations::aggregate(&dataset, &matched.column, operation)?;
        let cells_count = dataset
            .column(&matched.column)
            .map(|c| c.cells.iter().filter_map(Cell::coerce_number).count())
            .unwrap_or_default();
        Ok(ColumnAnalysis {
            result,
            matched_column: matched.column,
            match_kind: matched.kind,
            cells_count,
            operation,
            total_rows: dataset.row_count(),
            total_columns: dataset.column_count(),
        })
    }

    pub fn inspect(&self, path: &Path) -> Result<FileInfo> {
        let dataset = self.load_cached(path)?;
        file_info(path, &dataset)
    }

    /// Loads `path` through the cache.
    pub fn load_cached(&self, path: &Path) -> Result<Arc<Dataset>> {
        if let Some(dataset) = self.cache.get(path) {
            return Ok(dataset);
        }
        let dataset = Arc::new(loader::load_dataset(path, &self.settings.load_options())?);
        self.cache.put(path, Arc::clone(&dataset));
        Ok(dataset)
    }
}

fn file_info(path: &Path, dataset: &Dataset) -> Result<FileInfo> {
    let size = fs::metadata(path)?.len();
    Ok(FileInfo::new(path, size, dataset))
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| display_path(path))
}
