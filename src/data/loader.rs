// ============================================================
// Layer 4 — Metadata Loader
// ============================================================
// Reads the HAM10000 metadata CSV with the `csv` crate and
// writes / reads the cleaned table produced by preprocessing.
//
// Loading does the first two pipeline steps, in order:
//   1. Trim whitespace on every cell and header (csv Trim::All)
//   2. Check every required column is present; if not, the
//      whole run aborts naming the missing columns
//
// Rows are then deserialised into RawRecord. Empty cells
// become None; columns we don't know about (e.g. a pandas
// index column) are ignored.
//
// Reference: csv crate tutorial (serde deserialisation)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::record::{CleanedRecord, RawRecord, REQUIRED_COLUMNS};
use crate::domain::traits::RecordSource;

/// Loads raw lesion metadata from a CSV file.
/// Implements the RecordSource trait from Layer 3.
pub struct MetadataCsvLoader {
    path: PathBuf,
}

impl MetadataCsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for MetadataCsvLoader {
    fn load_all(&self) -> Result<Vec<RawRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open metadata CSV '{}'", self.path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Cannot read header row of '{}'", self.path.display()))?
            .clone();
        validate_columns(headers.iter())?;

        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<RawRecord>().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let record = row.with_context(|| {
                format!("Malformed row at line {} of '{}'", i + 2, self.path.display())
            })?;
            records.push(record);
        }

        tracing::info!("Loaded {} metadata rows from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

/// Fail fast if any required column is absent.
pub fn validate_columns<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let present: Vec<&str> = headers.into_iter().collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.contains(c))
        .collect();

    if !missing.is_empty() {
        bail!("Metadata is missing expected columns: {}", missing.join(", "));
    }
    Ok(())
}

/// Write the cleaned table. Column order follows CleanedRecord's fields.
pub fn write_cleaned_table(path: &Path, rows: &[CleanedRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create cleaned table '{}'", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::debug!("Wrote {} cleaned rows to '{}'", rows.len(), path.display());
    Ok(())
}

/// Read a cleaned table written by `write_cleaned_table`.
pub fn read_cleaned_table(path: &Path) -> Result<Vec<CleanedRecord>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| {
        format!(
            "Cannot open cleaned table '{}'. Have you run 'preprocess' first?",
            path.display()
        )
    })?;

    let rows = reader
        .deserialize::<CleanedRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Malformed cleaned table '{}'", path.display()))?;

    tracing::info!("Loaded {} cleaned rows from '{}'", rows.len(), path.display());
    Ok(rows)
}
