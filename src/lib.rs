pub mod analysis;
pub mod assistant;
pub mod cache;
pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod intent;
pub mod io_utils;
pub mod loader;
pub mod locate;
pub mod operations;
pub mod params;
pub mod persist;
pub mod summary;
pub mod table;
pub mod update;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    assistant::Assistant,
    cli::{Cli, Commands},
    config::Settings,
    operations::OperationRequest,
    summary::format_amount,
    table::Alignment,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_assist", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let assistant = Assistant::new(load_settings(&cli)?);
    match cli.command {
        Commands::Run(args) => handle_run(&assistant, &args),
        Commands::Update(args) => handle_update(&assistant, &args),
        Commands::Analyze(args) => handle_analyze(&assistant, &args),
        Commands::Inspect(args) => handle_inspect(&assistant, &args),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => {
            Settings::load(path).with_context(|| format!("Loading settings from {path:?}"))?
        }
        None => Settings::default(),
    };
    if let Some(dir) = &cli.documents_dir {
        settings.documents_dir = dir.clone();
    }
    debug!("Effective settings: {settings:?}");
    Ok(settings)
}

fn handle_run(assistant: &Assistant, args: &cli::RunArgs) -> Result<()> {
    let response = assistant
        .smart_file_operation(&args.command, args.file.as_deref())
        .with_context(|| format!("Running command '{}'", args.command))?;
    info!(
        "Completed {} on {}",
        response.operation_type, response.file_analyzed
    );
    print_json(&response, args.compact)
}

fn handle_update(assistant: &Assistant, args: &cli::UpdateArgs) -> Result<()> {
    let request = OperationRequest {
        column: args.column.clone(),
        value: args.value.clone(),
        percentage: args.percentage,
    };
    let response = assistant
        .update_spreadsheet(&args.input, args.operation, &request)
        .with_context(|| format!("Applying {} to {:?}", args.operation, args.input))?;
    info!(
        "{} row(s) written to {} ({})",
        response.rows_updated, response.output_file, response.update_type
    );
    print_json(&response, args.compact)
}

fn handle_analyze(assistant: &Assistant, args: &cli::AnalyzeArgs) -> Result<()> {
    let analysis = assistant
        .analyze_column(&args.input, args.operation, &args.column)
        .with_context(|| format!("Analyzing column '{}' in {:?}", args.column, args.input))?;
    print_json(&analysis, args.compact)
}

fn handle_inspect(assistant: &Assistant, args: &cli::InspectArgs) -> Result<()> {
    let info = assistant
        .inspect(&args.input)
        .with_context(|| format!("Inspecting {:?}", args.input))?;
    let dataset = assistant
        .load_cached(&args.input)
        .with_context(|| format!("Loading {:?}", args.input))?;

    println!(
        "{}: {} row(s) x {} column(s), {:.2} MB, {}",
        info.filename,
        info.rows,
        info.columns,
        info.size_mb,
        dataset.source().label()
    );
    let overview_headers = ["column", "type", "total", "average", "min", "max"]
        .map(String::from)
        .to_vec();
    let overview = info
        .column_names
        .iter()
        .map(|name| {
            let mut row = vec![
                name.clone(),
                info.data_types.get(name).copied().unwrap_or("text").to_string(),
            ];
            match info.summary_stats.get(name) {
                Some(stats) => row.extend(
                    [stats.total, stats.average, stats.min, stats.max]
                        .map(|value| format_amount(name, value)),
                ),
                None => row.extend(std::iter::repeat_n(String::new(), 4)),
            }
            row
        })
        .collect::<Vec<_>>();
    let mut alignments = vec![Alignment::Left; 2];
    alignments.extend([Alignment::Right; 4]);
    table::print_table(&overview_headers, &overview, &alignments);

    println!();
    let preview = dataset
        .display_rows()
        .take(args.rows)
        .collect::<Vec<_>>();
    let preview_alignments = dataset
        .columns()
        .iter()
        .map(|column| {
            if column.is_numeric() {
                Alignment::Right
            } else {
                Alignment::Left
            }
        })
        .collect::<Vec<_>>();
    table::print_table(&dataset.header_names(), &preview, &preview_alignments);
    info!("Displayed {} row(s) from {:?}", preview.len(), args.input);
    Ok(())
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Serializing response")?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
