// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the cleaned table + cap rows   (Layer 4 - data)
//   Step 2: Load encoding map + age scaler      (Layer 6 - infra)
//   Step 3: Reopen images, build features       (Layer 4 - data)
//   Step 4: Fit the label map                   (Layer 3 - domain)
//   Step 5: Stratified train/test split         (Layer 4 - data)
//   Step 6: Run training loop                   (Layer 5 - ml)
//   Step 7: Evaluate on the test split          (Layer 6 - infra)
//   Step 8: Persist every artifact              (Layer 6 - infra)
//   Step 9: Log one sample prediction           (Layer 5 - ml)
//
// Rows whose image cannot be opened are dropped in step 3, and
// only there; the preprocessing run kept them on purpose.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::{LabeledSample, LesionDataset},
    encoder::{image_features_from_path, metadata_from_cleaned},
    loader::read_cleaned_table,
    splitter::stratified_split,
};
use crate::domain::{
    encoding::{AgeScaler, EncodingMap, LabelMap},
    feature_vector::{FeatureSchema, FeatureVector, FEATURE_LEN},
    traits::{DiagnosisClassifier, Persistable},
    vocabulary::diagnosis_full_name,
};
use crate::infra::{
    artifact_store::{write_json, ArtifactStore},
    checkpoint::{CheckpointManager, ModelFormat},
    metrics::{ClassificationReport, MetricsLogger},
};
use crate::ml::{
    inferencer::FrozenClassifier,
    model::LesionClassifierConfig,
    trainer::{predict_classes, run_training},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All inputs and hyperparameters for a training run.
// Saved next to the model as train_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub cleaned_csv:       PathBuf,
    pub encoding_map_path: PathBuf,
    pub age_scaler_path:   PathBuf,
    pub artifacts_dir:     PathBuf,
    /// Relative image paths in the cleaned table resolve against this
    pub data_root:         PathBuf,
    /// 0 = use every row
    pub max_rows:          usize,
    pub test_fraction:     f64,
    pub seed:              u64,
    pub epochs:            usize,
    pub batch_size:        usize,
    pub lr:                f64,
    pub format:            ModelFormat,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            cleaned_csv:       "data/HAM10000_metadata_preprocessed.csv".into(),
            encoding_map_path: "data/label_encoders.json".into(),
            age_scaler_path:   "data/age_scaler.json".into(),
            artifacts_dir:     "models".into(),
            data_root:         ".".into(),
            max_rows:          2000,
            test_fraction:     0.2,
            seed:              42,
            epochs:            10,
            batch_size:        32,
            lr:                1e-3,
            format:            ModelFormat::Compact,
        }
    }
}

impl TrainConfig {
    pub fn with_artifacts_dir(dir: impl Into<PathBuf>) -> Self {
        Self { artifacts_dir: dir.into(), ..Self::default() }
    }

    fn resolve_image(&self, image_path: &str) -> PathBuf {
        let path = Path::new(image_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }
}

/// What one training run produced
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub rows_used:     usize,
    pub rows_dropped:  usize,
    pub train_samples: usize,
    pub test_samples:  usize,
    pub classes:       Vec<String>,
    pub report:        ClassificationReport,
    pub model_path:    PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Cleaned table ─────────────────────────────────────────────
        let mut rows = read_cleaned_table(&cfg.cleaned_csv)?;
        if cfg.max_rows > 0 && rows.len() > cfg.max_rows {
            tracing::info!("Using the first {} of {} rows", cfg.max_rows, rows.len());
            rows.truncate(cfg.max_rows);
        }

        // ── Step 2: Encoders fitted by preprocessing ──────────────────────────
        let encoding_map = EncodingMap::load(&cfg.encoding_map_path)
            .context("Have you run 'preprocess' first?")?;
        let age_scaler = AgeScaler::load(&cfg.age_scaler_path)
            .context("Have you run 'preprocess' first?")?;

        // ── Step 3: Features ──────────────────────────────────────────────────
        // lesion_id, image_id, dx_type and age_outlier_flag are not features;
        // dx is the target.
        let mut features: Vec<(FeatureVector, String)> = Vec::with_capacity(rows.len());
        let mut dropped = 0usize;

        for row in &rows {
            let Some(dx) = encoding_map.decode("dx", row.dx) else {
                tracing::warn!("Row '{}' has dx code {} outside the encoding map, skipping", row.image_id, row.dx);
                dropped += 1;
                continue;
            };

            let path = cfg.resolve_image(&row.image_path);
            match image_features_from_path(&path) {
                Ok(image) => {
                    let vector = FeatureVector::assemble(metadata_from_cleaned(row), &image);
                    features.push((vector, dx.to_string()));
                }
                Err(e) => {
                    tracing::warn!("Dropping '{}': {:#}", row.image_id, e);
                    dropped += 1;
                }
            }
        }

        if features.is_empty() {
            bail!(
                "No usable rows: none of the {} images under '{}' could be read",
                rows.len(),
                cfg.data_root.display()
            );
        }
        tracing::info!("Built {} feature vectors ({} rows dropped)", features.len(), dropped);

        // ── Step 4: Label map ─────────────────────────────────────────────────
        let label_map = LabelMap::fit(features.iter().map(|(_, dx)| dx.as_str()));
        tracing::info!("Classes: {}", label_map.classes.join(", "));

        let samples = features
            .into_iter()
            .map(|(features, dx)| {
                let label = label_map
                    .encode(&dx)
                    .ok_or_else(|| anyhow!("Diagnosis '{dx}' missing from the fitted label map"))?;
                Ok(LabeledSample { features, label })
            })
            .collect::<Result<Vec<_>>>()?;
        let rows_used = samples.len();

        // ── Step 5: Split ─────────────────────────────────────────────────────
        let (train, test) = stratified_split(samples, |s| s.label, cfg.test_fraction, cfg.seed);
        tracing::info!("Split: {} train, {} test", train.len(), test.len());
        let train = LesionDataset::new(train);
        let test  = LesionDataset::new(test);

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let logger = MetricsLogger::new(&cfg.artifacts_dir)?;
        let model  = run_training(cfg, label_map.len(), &train, &test, &logger)?;

        // ── Step 7: Evaluate ──────────────────────────────────────────────────
        let predicted = predict_classes(&model, &test, cfg.batch_size);
        let report    = ClassificationReport::compute(&test.labels(), &predicted, &label_map);
        tracing::info!("Test accuracy: {:.4}", report.accuracy);

        // ── Step 8: Persist ───────────────────────────────────────────────────
        let ckpt  = CheckpointManager::new(&cfg.artifacts_dir);
        let store = ArtifactStore::new(&cfg.artifacts_dir);

        ckpt.save_model_config(&LesionClassifierConfig::new(FEATURE_LEN, label_map.len()))?;
        let model_path = ckpt.save_model(&model, cfg.format)?;
        ckpt.save_train_config(cfg)?;

        label_map.save(&store.label_map_path())?;
        FeatureSchema::current().save(&store.feature_schema_path())?;
        encoding_map.save(&store.encoding_map_path())?;
        age_scaler.save(&store.age_scaler_path())?;
        write_json(&store.evaluation_path(), &report)?;
        tracing::info!("Artifacts saved to '{}'", cfg.artifacts_dir.display());

        // ── Step 9: Sample prediction ─────────────────────────────────────────
        if let Some(sample) = test.get(0).or_else(|| train.get(0)) {
            let (index, confidence) = FrozenClassifier::from_model(&model).predict(&sample.features)?;
            let predicted = label_map.decode(index).unwrap_or("?");
            let actual    = label_map.decode(sample.label).unwrap_or("?");
            tracing::info!(
                "Sample prediction: {} ({}) with confidence {:.3}, actual {}",
                predicted,
                diagnosis_full_name(predicted),
                confidence,
                actual
            );
        }

        Ok(TrainSummary {
            rows_used,
            rows_dropped:  dropped,
            train_samples: train.len(),
            test_samples:  test.len(),
            classes:       label_map.classes.clone(),
            report,
            model_path,
        })
    }
}
