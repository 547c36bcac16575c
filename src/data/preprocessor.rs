// ============================================================
// Layer 4 — Metadata Preprocessor
// ============================================================
// Turns trimmed, validated RawRecords into the cleaned table.
// (Trimming and column validation happen in the loader.)
//
// Steps, applied in order; later steps read the columns the
// earlier ones produced:
//   3. Impute: age ← median, categoricals ← mode
//   4. Encode sex / localization / dx / dx_type via the
//      Encoding Map (fixed vocabularies + fitted dx, dx_type)
//   5. Flag age outliers (< 0 or > 120)
//   6. Min-max normalise age (scaler fitted on this batch)
//   7. Resolve <images_dir>/<image_id>.jpg and report the
//      files that don't exist (rows are kept)
//
// Every statistic is fitted on the batch it transforms, and
// nothing depends on iteration order of a HashMap, so running
// twice on the same input gives identical output.
//
// Reference: scikit-learn SimpleImputer / LabelEncoder / MinMaxScaler
//            Rust Book §13 (Iterators)

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::domain::encoding::{AgeScaler, EncodingMap};
use crate::domain::record::{CleanedRecord, RawRecord, CATEGORICAL_COLUMNS};

const AGE_MIN_PLAUSIBLE: f64 = 0.0;
const AGE_MAX_PLAUSIBLE: f64 = 120.0;

/// What the pipeline did, for the CLI to print
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessReport {
    pub rows:           usize,
    /// Column → number of cells filled in by the imputer
    pub imputed:        BTreeMap<String, usize>,
    pub age_outliers:   usize,
    pub missing_images: Vec<String>,
    /// Diagnosis code → row count
    pub dx_counts:      BTreeMap<String, usize>,
}

/// Everything the pipeline produces
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub table:        Vec<CleanedRecord>,
    pub encoding_map: EncodingMap,
    pub age_scaler:   AgeScaler,
    pub report:       PreprocessReport,
}

pub struct Preprocessor {
    images_dir: PathBuf,
}

impl Preprocessor {
    /// `images_dir` is where `<image_id>.jpg` files are looked up
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self { images_dir: images_dir.into() }
    }

    /// Run steps 3–7 over one batch of records.
    pub fn run(&self, mut records: Vec<RawRecord>) -> Result<PreprocessOutput> {
        if records.is_empty() {
            bail!("Metadata table has no rows");
        }

        let mut report = PreprocessReport { rows: records.len(), ..Default::default() };

        // ── Step 3: Impute missing values ─────────────────────────────────────
        let (ages, age_imputed) = impute_age(&records)?;
        report.imputed.insert("age".to_string(), age_imputed);

        for column in CATEGORICAL_COLUMNS {
            let n = impute_mode(&mut records, column)?;
            report.imputed.insert(column.to_string(), n);
        }

        // ── Step 4: Encode categoricals ───────────────────────────────────────
        let encoding_map = fit_encoding_map(&records);
        for column in CATEGORICAL_COLUMNS {
            if let Some(labels) = encoding_map.labels(column) {
                tracing::info!("Encoded {} → {} classes", column, labels.len());
            }
        }

        // ── Step 6 (fit): Age scaler ──────────────────────────────────────────
        let age_scaler = AgeScaler::fit(&ages).context("Age column has no values")?;

        // ── Steps 4–7 per row ─────────────────────────────────────────────────
        let mut table = Vec::with_capacity(records.len());
        for (record, age) in records.iter().zip(ages.iter().copied()) {
            let image_id   = record.image_id.clone().unwrap_or_default();
            let image_path = self.image_path(&image_id);
            if !image_path.exists() {
                report.missing_images.push(image_path.to_string_lossy().into_owned());
            }

            // Step 5: outlier flag is computed on the raw (imputed) age
            let age_outlier_flag = u8::from(!(AGE_MIN_PLAUSIBLE..=AGE_MAX_PLAUSIBLE).contains(&age));
            report.age_outliers += age_outlier_flag as usize;

            let dx = record.dx.as_deref().unwrap_or_default();
            *report.dx_counts.entry(dx.to_string()).or_insert(0) += 1;

            table.push(CleanedRecord {
                lesion_id:        record.lesion_id.clone().unwrap_or_default(),
                image_id,
                dx:               encode_required(&encoding_map, "dx", record.dx.as_deref())?,
                dx_type:          encode_required(&encoding_map, "dx_type", record.dx_type.as_deref())?,
                age:              age_scaler.transform(age),
                sex:              encode_required(&encoding_map, "sex", record.sex.as_deref())?,
                localization:     encode_required(&encoding_map, "localization", record.localization.as_deref())?,
                age_outlier_flag,
                image_path:       image_path.to_string_lossy().into_owned(),
            });
        }

        tracing::info!("Age outliers flagged: {}", report.age_outliers);
        if report.missing_images.is_empty() {
            tracing::info!("All image paths resolved successfully");
        } else {
            tracing::warn!(
                "{} image files not found under '{}'",
                report.missing_images.len(),
                self.images_dir.display()
            );
            for path in &report.missing_images {
                tracing::debug!("Missing image: {}", path);
            }
        }

        Ok(PreprocessOutput { table, encoding_map, age_scaler, report })
    }

    fn image_path(&self, image_id: &str) -> PathBuf {
        self.images_dir.join(format!("{image_id}.jpg"))
    }
}

/// Parsed ages with missing / non-numeric cells replaced by the median.
/// Returns the filled ages and how many were imputed.
fn impute_age(records: &[RawRecord]) -> Result<(Vec<f64>, usize)> {
    let mut present: Vec<f64> = records.iter().filter_map(RawRecord::parsed_age).collect();
    if present.is_empty() {
        bail!("Age column has no numeric values to impute from");
    }
    present.sort_by(f64::total_cmp);
    let fill = median_of_sorted(&present);

    let mut imputed = 0;
    let ages = records
        .iter()
        .map(|r| {
            r.parsed_age().unwrap_or_else(|| {
                imputed += 1;
                fill
            })
        })
        .collect();

    Ok((ages, imputed))
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Fill missing cells of a categorical column with its most frequent value.
/// Ties go to the lexicographically smallest value.
fn impute_mode(records: &mut [RawRecord], column: &str) -> Result<usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in records.iter().filter_map(|r| r.categorical(column)) {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    // BTreeMap iterates in key order, so max_by keeping the first
    // maximum means the smallest key wins a tie.
    let mode = counts
        .iter()
        .fold(None, |best: Option<(&String, usize)>, (k, &n)| match best {
            Some((_, bn)) if bn >= n => best,
            _ => Some((k, n)),
        })
        .map(|(k, _)| k.clone());

    let Some(mode) = mode else {
        bail!("Column '{}' has no values to impute from", column);
    };

    let mut filled = 0;
    for record in records.iter_mut() {
        if let Some(cell) = record.categorical_mut(column) {
            if cell.is_none() {
                *cell = Some(mode.clone());
                filled += 1;
            }
        }
    }
    Ok(filled)
}

/// Fixed tables for sex / localization, fitted tables for dx / dx_type
fn fit_encoding_map(records: &[RawRecord]) -> EncodingMap {
    let mut map = EncodingMap::with_fixed_vocabularies();
    for column in ["dx", "dx_type"] {
        map.fit_column(column, records.iter().filter_map(|r| r.categorical(column)));
    }
    map
}

fn encode_required(map: &EncodingMap, column: &str, value: Option<&str>) -> Result<u32> {
    map.encode_or_unknown(column, value).with_context(|| {
        format!("Cannot encode {} value {:?}", column, value.unwrap_or_default())
    })
}
