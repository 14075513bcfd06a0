use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::operations::{AggregateOp, UpdateOperation};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Read, analyze, and update spreadsheets with plain-language commands",
    long_about = None
)]
pub struct Cli {
    /// YAML settings file (documents directory, retries, thresholds)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory searched for spreadsheets named in commands
    #[arg(long = "documents-dir", global = true)]
    pub documents_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interpret a natural-language command against the file it mentions
    Run(RunArgs),
    /// Apply a named update operation to a spreadsheet in place
    Update(UpdateArgs),
    /// Aggregate a single column (sum, total, avg, count)
    Analyze(AnalyzeArgs),
    /// Show a column overview and the first rows of a spreadsheet
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Command text, e.g. "Increase all salaries in payroll.csv by 10%"
    pub command: String,
    /// File to operate on instead of the one inferred from the command
    #[arg(short, long)]
    pub file: Option<String>,
    /// Emit single-line JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Spreadsheet to update
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Operation to apply
    #[arg(long, value_enum)]
    pub operation: UpdateOperation,
    /// Column name for add-column
    #[arg(short = 'C', long)]
    pub column: Option<String>,
    /// Value for add-column or bonus-update
    #[arg(long)]
    pub value: Option<String>,
    /// Percentage for salary-increase (defaults to 10)
    #[arg(long)]
    pub percentage: Option<f64>,
    /// Emit single-line JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Spreadsheet to read
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Aggregation to compute
    #[arg(long, value_enum)]
    pub operation: AggregateOp,
    /// Column to aggregate; matched exactly, then ignoring case, then fuzzily
    #[arg(short = 'C', long)]
    pub column: String,
    /// Emit single-line JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Spreadsheet to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to preview
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}
