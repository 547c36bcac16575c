// ============================================================
// Layer 2 — PreprocessUseCase
// ============================================================
// Orchestrates the metadata pipeline in order:
//
//   Step 1: Load + trim the metadata CSV   (Layer 4 - data)
//   Step 2: Validate required columns      (Layer 4 - data)
//   Step 3: Impute / encode / flag /
//           normalise / resolve images     (Layer 4 - data)
//   Step 4: Write the cleaned table        (Layer 4 - data)
//   Step 5: Persist encoding map + scaler  (Layer 6 - infra)
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    loader::{write_cleaned_table, MetadataCsvLoader},
    preprocessor::{PreprocessReport, Preprocessor},
};
use crate::domain::traits::{Persistable, RecordSource};

// ─── Preprocess Configuration ────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub metadata_csv:      PathBuf,
    pub images_dir:        PathBuf,
    pub output_csv:        PathBuf,
    pub encoding_map_path: PathBuf,
    pub age_scaler_path:   PathBuf,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            metadata_csv:      "data/HAM10000_metadata.csv".into(),
            images_dir:        "data/HAM10000_images_part_1".into(),
            output_csv:        "data/HAM10000_metadata_preprocessed.csv".into(),
            encoding_map_path: "data/label_encoders.json".into(),
            age_scaler_path:   "data/age_scaler.json".into(),
        }
    }
}

// ─── PreprocessUseCase ────────────────────────────────────────────────────────
pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline end to end and return what it did.
    pub fn execute(&self) -> Result<PreprocessReport> {
        let cfg = &self.config;

        // ── Steps 1–2: Load, trim, validate ──────────────────────────────────
        tracing::info!("Loading metadata from '{}'", cfg.metadata_csv.display());
        let records = MetadataCsvLoader::new(&cfg.metadata_csv).load_all()?;

        // ── Step 3: Clean + encode ───────────────────────────────────────────
        let output = Preprocessor::new(&cfg.images_dir).run(records)?;

        // ── Steps 4–5: Persist ───────────────────────────────────────────────
        write_cleaned_table(&cfg.output_csv, &output.table)?;
        output.encoding_map.save(&cfg.encoding_map_path)?;
        output.age_scaler.save(&cfg.age_scaler_path)?;

        tracing::info!(
            "Preprocessed data saved to '{}' ({} rows)",
            cfg.output_csv.display(),
            output.table.len()
        );
        tracing::info!("Encoding map saved to '{}'", cfg.encoding_map_path.display());

        Ok(output.report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_cleaned_table;
    use crate::domain::encoding::{AgeScaler, EncodingMap};
    use std::fs;

    fn config(dir: &std::path::Path) -> PreprocessConfig {
        PreprocessConfig {
            metadata_csv:      dir.join("meta.csv"),
            images_dir:        dir.join("images"),
            output_csv:        dir.join("out/clean.csv"),
            encoding_map_path: dir.join("out/label_encoders.json"),
            age_scaler_path:   dir.join("out/age_scaler.json"),
        }
    }

    #[test]
    fn test_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::create_dir_all(&cfg.images_dir).unwrap();
        fs::write(cfg.images_dir.join("ISIC_1.jpg"), b"present").unwrap();
        fs::write(
            &cfg.metadata_csv,
            " lesion_id , image_id ,dx,dx_type,age,sex,localization\n\
             HAM_1, ISIC_1 ,nv,histo,40,male,back\n\
             HAM_2,ISIC_2,mel,histo,80,female, face \n",
        )
        .unwrap();

        let report = PreprocessUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.missing_images.len(), 1);
        assert!(report.missing_images[0].ends_with("ISIC_2.jpg"));

        let table = read_cleaned_table(&cfg.output_csv).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].age, 0.0);
        assert_eq!(table[1].age, 1.0);

        let map = EncodingMap::load(&cfg.encoding_map_path).unwrap();
        assert_eq!(map.labels("dx").unwrap(), ["mel".to_string(), "nv".to_string()]);
        assert_eq!(AgeScaler::load(&cfg.age_scaler_path).unwrap(), AgeScaler { min: 40.0, max: 80.0 });
    }

    #[test]
    fn test_missing_column_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        fs::write(&cfg.metadata_csv, "lesion_id,image_id,dx\nHAM_1,ISIC_1,nv\n").unwrap();

        let err = PreprocessUseCase::new(cfg.clone()).execute().unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("dx_type"));
        assert!(msg.contains("localization"));
        assert!(!cfg.output_csv.exists());
    }
}
