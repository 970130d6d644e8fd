use anyhow::{Context, Result};
use csv::{Terminator, Writer, WriterBuilder};
use log::{info, warn};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::extract::{ExtractedRecord, CSV_HEADERS};

pub struct CsvOutput {
    writer: Writer<File>,
    file_path: PathBuf,
    records_written: usize,
}

impl CsvOutput {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        info!("Initializing output file: {}", file_path.display());
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory structure for: {}", file_path.display()))?;
        }

        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create output file: {}", file_path.display()))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::CRLF)
            .from_writer(file);
        writer
            .write_record(CSV_HEADERS)
            .context("Failed to write header to output file")?;

        Ok(Self {
            writer,
            file_path,
            records_written: 0,
        })
    }

    pub fn write_all(&mut self, records: &[ExtractedRecord]) -> Result<()> {
        for record in records {
            self.writer
                .serialize(record)
                .with_context(|| format!("Failed to write record {} to {}", record.id, self.file_path.display()))?;
            self.records_written += 1;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.file_path.display()))?;
        info!("Data saved to {} ({} records)", self.file_path.display(), self.records_written);
        Ok(self.records_written)
    }
}

/// Writes the records as CSV. Nothing is created when there is nothing to write.
pub fn save_to_csv<P: AsRef<Path>>(records: &[ExtractedRecord], path: P) -> Result<Option<usize>> {
    if records.is_empty() {
        warn!("No data to save; skipping {}", path.as_ref().display());
        return Ok(None);
    }
    let mut output = CsvOutput::create(path)?;
    output.write_all(records)?;
    output.finish().map(Some)
}
