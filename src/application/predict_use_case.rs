// ============================================================
// Layer 2 — PredictionService
// ============================================================
// "Classify one record": the only operation the HTTP server
// and the `predict` subcommand need.
//
// Built once at start-up from an artifact directory:
//
//   feature_schema.json ─┐
//   model_config.json    ├─► FrozenClassifier  (weights snapshot)
//   model.mpk[.gz]      ─┘
//   label_map.json       ─► LabelMap   (fallback: 7 HAM10000 codes)
//   encoding_map.json    ─► FeatureEncoder (fallback: fixed vocabularies)
//   age_scaler.json     ─┘
//
// Loading never fails. Any problem leaves the service in a
// degraded state: it still starts, and every request gets
// PredictError::ModelUnavailable with the reason.
//
// The service is immutable after load, so one Arc<PredictionService>
// is shared by every request without a lock.
//
// Reference: Rust Book §9 (Error Handling), thiserror docs

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::data::encoder::{image_features_from_bytes, FeatureEncoder};
use crate::domain::{
    encoding::{AgeScaler, EncodingMap, LabelMap},
    feature_vector::{FeatureSchema, FEATURE_LEN},
    traits::{DiagnosisClassifier, Persistable},
    vocabulary::{diagnosis_full_name, DIAGNOSIS_CODES},
};
use crate::infra::{artifact_store::ArtifactStore, checkpoint::CheckpointManager};
use crate::ml::inferencer::FrozenClassifier;

// ─── Request / Response ───────────────────────────────────────────────────────

/// Raw fields of one classification request. Strings are untrimmed
/// user input; `None` means the field was absent or empty.
#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    pub age:          Option<String>,
    pub sex:          Option<String>,
    pub localization: Option<String>,
    pub image:        Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Diagnosis code, e.g. "mel"
    pub prediction: String,
    /// Highest softmax probability
    pub confidence: f32,
    /// Human-readable diagnosis
    pub dx_full:    String,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid age value: '{0}'")]
    InvalidAge(String),

    #[error("Could not read the uploaded image: {0}")]
    UnreadableImage(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

// ─── PredictionService ────────────────────────────────────────────────────────

struct LoadedModel {
    classifier: FrozenClassifier,
    encoder:    FeatureEncoder,
    labels:     LabelMap,
}

pub struct PredictionService {
    state: std::result::Result<LoadedModel, String>,
}

impl PredictionService {
    /// Load every artifact from `dir`. Problems are logged and
    /// leave the service degraded instead of failing.
    pub fn load(dir: &Path) -> Self {
        let state = match load_artifacts(dir) {
            Ok(model) => {
                tracing::info!(
                    "Prediction service ready: {} classes ({})",
                    model.labels.len(),
                    model.labels.classes.join(", ")
                );
                Ok(model)
            }
            Err(e) => {
                tracing::error!("Prediction service degraded: {:#}", e);
                Err(format!("{e:#}"))
            }
        };
        Self { state }
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ok()
    }

    /// The error every request gets while degraded
    pub fn unavailable_error(&self) -> Option<PredictError> {
        self.state
            .as_ref()
            .err()
            .map(|reason| PredictError::ModelUnavailable(reason.clone()))
    }

    /// Validate, encode and classify one record.
    pub fn classify(&self, request: &PredictionRequest) -> std::result::Result<Prediction, PredictError> {
        let model = self
            .state
            .as_ref()
            .map_err(|reason| PredictError::ModelUnavailable(reason.clone()))?;

        // ── Validate ──────────────────────────────────────────────────────────
        let age_raw = non_empty(request.age.as_deref()).ok_or(PredictError::MissingField("age"))?;
        let image   = request
            .image
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(PredictError::MissingField("image"))?;
        let age = age_raw
            .parse::<f64>()
            .ok()
            .filter(|a| a.is_finite())
            .ok_or_else(|| PredictError::InvalidAge(age_raw.to_string()))?;

        // ── Encode ────────────────────────────────────────────────────────────
        let image = image_features_from_bytes(image)
            .map_err(|e| PredictError::UnreadableImage(format!("{e:#}")))?;
        let features = model.encoder.encode(
            age,
            non_empty(request.sex.as_deref()),
            non_empty(request.localization.as_deref()),
            &image,
        );

        // ── Predict + decode ──────────────────────────────────────────────────
        let (index, confidence) = model
            .classifier
            .predict(&features)
            .map_err(|e| PredictError::Prediction(format!("{e:#}")))?;
        let code = model
            .labels
            .decode(index)
            .ok_or_else(|| PredictError::Prediction(format!("class index {index} has no label")))?;

        Ok(Prediction {
            prediction: code.to_string(),
            confidence,
            dx_full:    diagnosis_full_name(code).to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn load_artifacts(dir: &Path) -> Result<LoadedModel> {
    let store = ArtifactStore::new(dir);

    // ── Schema ────────────────────────────────────────────────────────────────
    FeatureSchema::load(&store.feature_schema_path())?.ensure_compatible()?;

    // ── Weights ───────────────────────────────────────────────────────────────
    let (model, _loader) = CheckpointManager::new(dir).load_model(&Default::default())?;
    let classifier = FrozenClassifier::from_model(&model);
    if classifier.n_features() != FEATURE_LEN {
        bail!(
            "model expects {} features, this binary produces {}",
            classifier.n_features(),
            FEATURE_LEN
        );
    }

    // ── Label map ─────────────────────────────────────────────────────────────
    let label_path = store.label_map_path();
    let labels = if label_path.exists() {
        LabelMap::load(&label_path)?
    } else if classifier.num_classes() == DIAGNOSIS_CODES.len() {
        tracing::warn!(
            "'{}' not found, decoding with the built-in HAM10000 codes",
            label_path.display()
        );
        LabelMap::fallback()
    } else {
        bail!(
            "'{}' not found and the model has {} outputs, cannot decode predictions",
            label_path.display(),
            classifier.num_classes()
        );
    };
    if labels.len() != classifier.num_classes() {
        bail!(
            "label map has {} classes but the model has {} outputs",
            labels.len(),
            classifier.num_classes()
        );
    }

    // ── Encoders ──────────────────────────────────────────────────────────────
    let map_path = store.encoding_map_path();
    let encoding_map = if map_path.exists() {
        EncodingMap::load(&map_path)?
    } else {
        tracing::warn!("'{}' not found, using the fixed vocabularies", map_path.display());
        EncodingMap::with_fixed_vocabularies()
    };
    let age_scaler = AgeScaler::load(&store.age_scaler_path())
        .context("age normalisation needs the scaler fitted by preprocessing")?;

    Ok(LoadedModel {
        classifier,
        encoder: FeatureEncoder::new(encoding_map, age_scaler),
        labels,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::encoder::tests::jpeg_bytes;
    use crate::infra::checkpoint::ModelFormat;
    use crate::ml::{model::LesionClassifierConfig, InferBackend};
    use std::fs;

    /// A zero-weight 7-class model with every artifact next to it
    pub(crate) fn write_test_artifacts(dir: &Path) {
        let store = ArtifactStore::new(dir);
        let ckpt  = CheckpointManager::new(dir);
        let cfg   = LesionClassifierConfig::new(FEATURE_LEN, DIAGNOSIS_CODES.len());
        let model: crate::ml::model::LesionClassifier<InferBackend> = cfg.init(&Default::default());

        ckpt.save_model_config(&cfg).unwrap();
        ckpt.save_model(&model, ModelFormat::Compact).unwrap();
        LabelMap::fallback().save(&store.label_map_path()).unwrap();
        FeatureSchema::current().save(&store.feature_schema_path()).unwrap();
        EncodingMap::with_fixed_vocabularies().save(&store.encoding_map_path()).unwrap();
        AgeScaler { min: 0.0, max: 85.0 }.save(&store.age_scaler_path()).unwrap();
    }

    fn request() -> PredictionRequest {
        PredictionRequest {
            age:          Some("45".into()),
            sex:          Some("male".into()),
            localization: Some("back".into()),
            image:        Some(jpeg_bytes([180, 120, 90])),
        }
    }

    fn ready_service() -> (tempfile::TempDir, PredictionService) {
        let dir = tempfile::tempdir().unwrap();
        write_test_artifacts(dir.path());
        let service = PredictionService::load(dir.path());
        (dir, service)
    }

    #[test]
    fn test_classify_valid_request() {
        let (_dir, service) = ready_service();
        assert!(service.is_ready());

        let p = service.classify(&request()).unwrap();
        assert!(DIAGNOSIS_CODES.contains(&p.prediction.as_str()));
        assert!((0.0..=1.0).contains(&p.confidence));
        // Zero weights: uniform probabilities, first class wins the tie
        assert_eq!(p.prediction, "akiec");
        assert_eq!(p.dx_full, "Actinic keratoses and intraepithelial carcinoma");
        assert!((p.confidence - 1.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_fields() {
        let (_dir, service) = ready_service();

        let no_image = PredictionRequest { image: None, ..request() };
        assert!(matches!(service.classify(&no_image), Err(PredictError::MissingField("image"))));

        let blank_age = PredictionRequest { age: Some("  ".into()), ..request() };
        assert!(matches!(service.classify(&blank_age), Err(PredictError::MissingField("age"))));
    }

    #[test]
    fn test_invalid_age() {
        let (_dir, service) = ready_service();
        let req = PredictionRequest { age: Some("not-a-number".into()), ..request() };
        let err = service.classify(&req).unwrap_err();
        assert!(matches!(err, PredictError::InvalidAge(_)));
        assert_eq!(err.to_string(), "Invalid age value: 'not-a-number'");
    }

    #[test]
    fn test_unknown_categories_fall_back() {
        let (_dir, service) = ready_service();
        let req = PredictionRequest {
            sex:          Some("other".into()),
            localization: None,
            ..request()
        };
        assert!(service.classify(&req).is_ok());
    }

    #[test]
    fn test_garbage_image() {
        let (_dir, service) = ready_service();
        let req = PredictionRequest { image: Some(b"not an image".to_vec()), ..request() };
        assert!(matches!(service.classify(&req), Err(PredictError::UnreadableImage(_))));
    }

    #[test]
    fn test_empty_dir_degrades() {
        let dir     = tempfile::tempdir().unwrap();
        let service = PredictionService::load(dir.path());
        assert!(!service.is_ready());
        assert!(matches!(service.unavailable_error(), Some(PredictError::ModelUnavailable(_))));
        assert!(matches!(service.classify(&request()), Err(PredictError::ModelUnavailable(_))));
    }

    #[test]
    fn test_missing_label_map_uses_builtin_codes() {
        let dir = tempfile::tempdir().unwrap();
        write_test_artifacts(dir.path());
        fs::remove_file(dir.path().join("label_map.json")).unwrap();

        let service = PredictionService::load(dir.path());
        assert!(service.is_ready());
        assert_eq!(service.classify(&request()).unwrap().prediction, "akiec");
    }

    #[test]
    fn test_schema_mismatch_degrades() {
        let dir = tempfile::tempdir().unwrap();
        write_test_artifacts(dir.path());
        let mut schema = FeatureSchema::current();
        schema.version += 1;
        schema.save(&dir.path().join("feature_schema.json")).unwrap();

        assert!(!PredictionService::load(dir.path()).is_ready());
    }

    #[test]
    fn test_service_from_a_training_run() {
        use crate::application::train_use_case::{tests::prepared_run, TrainUseCase};

        let dir = tempfile::tempdir().unwrap();
        let cfg = prepared_run(dir.path());
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let service = PredictionService::load(&cfg.artifacts_dir);
        assert!(service.is_ready());
        let p = service.classify(&request()).unwrap();
        assert!(["mel", "nv"].contains(&p.prediction.as_str()));
    }
}
