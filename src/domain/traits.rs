// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers:
//
//   RecordSource        — anything that yields raw metadata rows
//                         (MetadataCsvLoader today)
//   DiagnosisClassifier — anything that turns one FeatureVector
//                         into class probabilities
//                         (FrozenClassifier today)
//   Persistable         — anything saved to / restored from the
//                         artifact directory as a single file
//
// The application layer talks to these traits, never to the
// csv / burn / serde_json types behind them.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::Path;

use anyhow::Result;

use crate::domain::feature_vector::FeatureVector;
use crate::domain::record::RawRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// Any component that can load raw lesion metadata.
pub trait RecordSource {
    /// Load every row. Fails if the source is unreadable or
    /// lacks a required column.
    fn load_all(&self) -> Result<Vec<RawRecord>>;
}

// ─── DiagnosisClassifier ──────────────────────────────────────────────────────
/// A fitted model that scores one feature vector.
pub trait DiagnosisClassifier {
    /// Number of classes the model outputs
    fn num_classes(&self) -> usize;

    /// Class probabilities, summing to 1, length = num_classes()
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f32>>;

    /// Index and probability of the most likely class
    fn predict(&self, features: &FeatureVector) -> Result<(usize, f32)> {
        let probs = self.predict_proba(features)?;
        probs
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| anyhow::anyhow!("model produced no class probabilities"))
    }
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state is one file on disk.
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore a component from the given path
    fn load(path: &Path) -> Result<Self>;
}
