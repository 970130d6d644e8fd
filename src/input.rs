use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use glob::glob;
use log::{debug, info, warn};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::extract::json_kind;

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn find_json_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for suffix in ["**/*.json", "**/*.json.gz"] {
        let pattern = directory.as_ref().join(suffix);
        let pattern_str = pattern.to_string_lossy();
        debug!("Searching for files matching pattern: {}", pattern_str);
        paths.extend(glob(&pattern_str)?.filter_map(Result::ok));
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Resolves `--input` into the list of files to read: the file itself, or
/// every JSON file under a directory.
pub fn find_input_files<P: AsRef<Path>>(input: P) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();
    if input.is_dir() {
        info!("Searching for input files in: {}", input.display());
        let files = find_json_files(input)?;
        if files.is_empty() {
            warn!("No .json or .json.gz files found under: {}", input.display());
        }
        Ok(files)
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

/// Reads one file holding a JSON array and returns its elements.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;

    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let document: Value = serde_json::from_reader(BufReader::new(reader))
        .with_context(|| format!("Failed to parse JSON from: {}", path.display()))?;

    match document {
        Value::Array(records) => {
            debug!("Loaded {} records from {}", records.len(), path.display());
            Ok(records)
        }
        other => Err(anyhow::anyhow!(
            "Expected a JSON array at the top level of {}, found a JSON {}",
            path.display(),
            json_kind(&other)
        )),
    }
}

/// Loads every file in order and concatenates their records.
pub fn load_all(files: &[PathBuf]) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    for path in files {
        let mut loaded = load_records(path)?;
        info!("Read {} records from {}", loaded.len(), path.display());
        records.append(&mut loaded);
    }
    Ok(records)
}
