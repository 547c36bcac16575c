// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the classifier weights with Burn's file
// recorders, plus the config needed to rebuild the model.
//
// What gets saved per training run:
//   1. Model weights      model.mpk.gz  (gzip'd half precision, default)
//                      or model.mpk     (full-precision MessagePack)
//   2. model_config.json  n_features / n_classes
//   3. train_config.json  the flags the run was started with
//
// Why save the config separately?
//   The recorder stores parameters only. To load them we first
//   rebuild a model of exactly the same shape, then pour the
//   record into it.
//
// Loading walks an ordered list of ModelLoader strategies:
//
//   CompactLoader        model.mpk.gz
//        │ (missing or unreadable)
//        ▼
//   FullPrecisionLoader  model.mpk
//
// The first strategy that succeeds wins and its name is logged.
// Saving one format removes a stale file of the other, so the
// directory never holds two different models.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §17 (Trait Objects)

use anyhow::{anyhow, bail, Context, Result};
use burn::{
    backend::ndarray::NdArrayDevice,
    prelude::*,
    record::{
        FullPrecisionSettings, HalfPrecisionSettings, NamedMpkFileRecorder,
        NamedMpkGzFileRecorder, Recorder,
    },
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs,
    path::PathBuf,
    str::FromStr,
};

use crate::infra::artifact_store::write_json;
use crate::ml::model::{LesionClassifier, LesionClassifierConfig};
use crate::ml::InferBackend;

pub const MODEL_STEM:        &str = "model";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";
pub const TRAIN_CONFIG_FILE: &str = "train_config.json";

// Burn's CompactRecorder writes a plain .mpk; the compact format is
// gzip'd so the two formats never share a file name.
type CompactGzRecorder     = NamedMpkGzFileRecorder<HalfPrecisionSettings>;
type FullPrecisionRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

// ─── ModelFormat ──────────────────────────────────────────────────────────────
/// On-disk encoding of the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFormat {
    /// gzip'd half-precision MessagePack
    #[default]
    Compact,
    /// plain full-precision MessagePack
    FullPrecision,
}

impl ModelFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ModelFormat::Compact       => "model.mpk.gz",
            ModelFormat::FullPrecision => "model.mpk",
        }
    }

    fn other(self) -> Self {
        match self {
            ModelFormat::Compact       => ModelFormat::FullPrecision,
            ModelFormat::FullPrecision => ModelFormat::Compact,
        }
    }
}

impl FromStr for ModelFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "mpk.gz"      => Ok(ModelFormat::Compact),
            "full" | "full-precision" | "mpk" => Ok(ModelFormat::FullPrecision),
            other => bail!("Unknown model format '{other}' (expected 'compact' or 'full')"),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::Compact       => write!(f, "compact"),
            ModelFormat::FullPrecision => write!(f, "full"),
        }
    }
}

// ─── ModelLoader strategies ───────────────────────────────────────────────────
/// One way of reading weights into an already-shaped model.
pub trait ModelLoader {
    /// Name logged when this strategy wins
    fn name(&self) -> &'static str;

    /// File this strategy reads, relative to the artifact directory
    fn file_name(&self) -> &'static str;

    /// `stem` is the path without extension; recorders add their own.
    fn load(
        &self,
        stem:   PathBuf,
        model:  LesionClassifier<InferBackend>,
        device: &NdArrayDevice,
    ) -> Result<LesionClassifier<InferBackend>>;
}

pub struct CompactLoader;

impl ModelLoader for CompactLoader {
    fn name(&self) -> &'static str {
        "compact"
    }

    fn file_name(&self) -> &'static str {
        ModelFormat::Compact.file_name()
    }

    fn load(
        &self,
        stem:   PathBuf,
        model:  LesionClassifier<InferBackend>,
        device: &NdArrayDevice,
    ) -> Result<LesionClassifier<InferBackend>> {
        let record = CompactGzRecorder::new()
            .load(stem, device)
            .context("Compact recorder could not read the weights")?;
        Ok(model.load_record(record))
    }
}

pub struct FullPrecisionLoader;

impl ModelLoader for FullPrecisionLoader {
    fn name(&self) -> &'static str {
        "full-precision"
    }

    fn file_name(&self) -> &'static str {
        ModelFormat::FullPrecision.file_name()
    }

    fn load(
        &self,
        stem:   PathBuf,
        model:  LesionClassifier<InferBackend>,
        device: &NdArrayDevice,
    ) -> Result<LesionClassifier<InferBackend>> {
        let record = FullPrecisionRecorder::new()
            .load(stem, device)
            .context("Full-precision recorder could not read the weights")?;
        Ok(model.load_record(record))
    }
}

/// Strategies in the order they are tried.
pub fn default_loaders() -> Vec<Box<dyn ModelLoader + Send + Sync>> {
    vec![Box::new(CompactLoader), Box::new(FullPrecisionLoader)]
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
/// Manages saving and loading of the model in one artifact directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Save model weights in the requested format.
    ///
    /// The recorder:
    ///   1. takes model.into_record() (all parameters)
    ///   2. serialises to MessagePack
    ///   3. gzips it for the compact format
    ///   4. writes {dir}/model.<ext>
    pub fn save_model<B: Backend>(
        &self,
        model:  &LesionClassifier<B>,
        format: ModelFormat,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // Path without extension, the recorder adds it
        let stem = self.dir.join(MODEL_STEM);
        let record = model.clone().into_record();

        match format {
            ModelFormat::Compact => CompactGzRecorder::new().record(record, stem.clone()),
            ModelFormat::FullPrecision => FullPrecisionRecorder::new().record(record, stem.clone()),
        }
        .with_context(|| format!("Failed to save model to '{}'", stem.display()))?;

        let path = self.dir.join(format.file_name());
        if !path.exists() {
            bail!("Recorder reported success but '{}' was not written", path.display());
        }

        let stale = self.dir.join(format.other().file_name());
        if stale != path && stale.exists() {
            fs::remove_file(&stale)
                .with_context(|| format!("Cannot remove stale '{}'", stale.display()))?;
            tracing::debug!("Removed stale '{}'", stale.display());
        }

        tracing::debug!("Saved model weights to '{}'", path.display());
        Ok(path)
    }

    /// Rebuild the model from model_config.json and load the weights
    /// with the first strategy that succeeds.
    pub fn load_model(
        &self,
        device: &NdArrayDevice,
    ) -> Result<(LesionClassifier<InferBackend>, &'static str)> {
        self.load_model_with(&default_loaders(), device)
    }

    pub fn load_model_with(
        &self,
        loaders: &[Box<dyn ModelLoader + Send + Sync>],
        device:  &NdArrayDevice,
    ) -> Result<(LesionClassifier<InferBackend>, &'static str)> {
        let config = self.load_model_config()?;
        let stem   = self.dir.join(MODEL_STEM);
        let mut attempts = Vec::new();

        for loader in loaders {
            let file = self.dir.join(loader.file_name());
            if !file.exists() {
                attempts.push(format!("{}: '{}' not found", loader.name(), file.display()));
                continue;
            }

            match loader.load(stem.clone(), config.init(device), device) {
                Ok(model) => {
                    tracing::info!("Model loaded with the {} loader from '{}'", loader.name(), file.display());
                    return Ok((model, loader.name()));
                }
                Err(e) => {
                    tracing::warn!("{} loader failed: {:#}", loader.name(), e);
                    attempts.push(format!("{}: {:#}", loader.name(), e));
                }
            }
        }

        bail!(
            "No model could be loaded from '{}'. Have you run 'train' first? ({})",
            self.dir.display(),
            attempts.join("; ")
        )
    }

    /// Save the model shape so inference can rebuild it.
    pub fn save_model_config(&self, cfg: &LesionClassifierConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_model_config(&self) -> Result<LesionClassifierConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        LesionClassifierConfig::load(&path).map_err(|e| {
            anyhow!(
                "Cannot read model config from '{}'. \
                 Make sure you have run 'train' before 'serve'. ({e})",
                path.display()
            )
        })
    }

    /// Record the flags of this training run next to the model.
    pub fn save_train_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        write_json(&self.dir.join(TRAIN_CONFIG_FILE), cfg)
    }
}
