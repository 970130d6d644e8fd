use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, LevelFilter};
use rayon::prelude::*;
use serde_json::Value;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::time::Instant;
use time::macros::format_description;

mod extract;
mod input;
mod output;
mod report;

use extract::{extract_record, ExtractError, ExtractedRecord, PayloadStrategy};
use report::SummaryStats;

#[derive(Parser)]
#[command(name = "Q&A Record Field Parser")]
#[command(about = "Extract id, question, answer, created_at, ip, type and subtype from a JSON array of Q&A log records into CSV")]
#[command(version = "1.0")]
struct Cli {
    #[arg(short, long, default_value = "demo.json", help = "JSON file (.json or .json.gz) or directory of them")]
    input: PathBuf,

    #[arg(short, long, default_value = "extracted_data.csv", help = "Output CSV file")]
    output: PathBuf,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,

    #[arg(short, long, default_value = "0", help = "Number of threads to use (0 for auto)")]
    threads: usize,

    #[arg(short, long, default_value = "5", help = "Number of extracted records to preview (0 to disable)")]
    preview: usize,

    #[arg(long, default_value = "100", help = "Maximum answer characters shown per preview record")]
    answer_width: usize,

    #[arg(long, help = "Keep only records with this type")]
    type_filter: Option<String>,
}

/// Records that made it through extraction, in input order.
struct Extraction {
    records: Vec<ExtractedRecord>,
    strategies: Vec<PayloadStrategy>,
    skipped: usize,
    filtered: usize,
}

impl Extraction {
    fn summary(&self) -> SummaryStats {
        let mut stats = SummaryStats::collect(&self.records, &self.strategies);
        stats.skipped_records = self.skipped;
        stats.filtered_records = self.filtered;
        stats
    }
}

fn parse_log_level(log_level_str: &str) -> LevelFilter {
    match log_level_str.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", other);
            LevelFilter::Info
        }
    }
}

fn setup_logging(log_level_str: &str) -> Result<()> {
    let log_level = parse_log_level(log_level_str);

    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    Ok(())
}

fn setup_thread_pool(thread_count: usize) -> usize {
    let num_threads = if thread_count == 0 {
        let cores = num_cpus::get();
        debug!("Auto-detected {} CPU cores. Using {} threads.", cores, cores);
        cores
    } else {
        debug!("Using specified {} threads.", thread_count);
        thread_count
    };

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global() {
        error!("Failed to build global thread pool: {}. Proceeding with default.", e);
    }

    num_threads
}

fn new_progress_bar(len: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec}) {msg}")
    {
        Ok(style) => progress_bar.set_style(style.progress_chars("=> ")),
        Err(e) => warn!("Falling back to default progress bar style: {}", e),
    }
    progress_bar
}

fn run_extraction(raw_records: &[Value], type_filter: Option<&str>) -> Extraction {
    let progress_bar = new_progress_bar(raw_records.len());
    progress_bar.set_message("Extracting fields...");

    let results: Vec<Result<(ExtractedRecord, PayloadStrategy), ExtractError>> = raw_records
        .par_iter()
        .map(|raw| {
            let result = extract_record(raw);
            progress_bar.inc(1);
            result
        })
        .collect();

    let mut extraction = Extraction {
        records: Vec::with_capacity(results.len()),
        strategies: Vec::with_capacity(results.len()),
        skipped: 0,
        filtered: 0,
    };

    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok((record, strategy)) => {
                if let Some(wanted) = type_filter {
                    if record.kind != wanted {
                        extraction.filtered += 1;
                        continue;
                    }
                }
                if strategy == PayloadStrategy::RegexFallback {
                    debug!("Record {} (id '{}'): arg1 recovered by regex fallback", i + 1, record.id);
                }
                extraction.records.push(record);
                extraction.strategies.push(strategy);
            }
            Err(e) => {
                warn!("Skipping record {}: {}", i + 1, e);
                extraction.skipped += 1;
            }
        }
    }

    progress_bar.finish_with_message(format!(
        "Extraction finished. {} records kept, {} skipped.",
        extraction.records.len(),
        extraction.skipped
    ));
    extraction
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    info!("Starting extraction from {}", cli.input.display());

    let num_threads = setup_thread_pool(cli.threads);
    info!("Using {} threads.", num_threads);
    if let Some(wanted) = &cli.type_filter {
        info!("Filtering by type: {}", wanted);
    }

    let files = input::find_input_files(&cli.input)?;
    if files.is_empty() {
        warn!("No input files found. Exiting.");
        return Ok(());
    }
    let raw_records = input::load_all(&files)?;

    let extraction = run_extraction(&raw_records, cli.type_filter.as_deref());
    if extraction.records.is_empty() {
        warn!("No records were extracted");
        report::log_summary(&extraction.summary(), start_time.elapsed());
        return Ok(());
    }
    info!("Successfully extracted {} records", extraction.records.len());

    report::log_preview(&extraction.records, cli.preview, cli.answer_width);

    output::save_to_csv(&extraction.records, &cli.output)?;

    report::log_summary(&extraction.summary(), start_time.elapsed());

    info!("Extraction process finished.");
    info!("-------------------------------------------------------");
    Ok(())
}
