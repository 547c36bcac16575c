// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// JSON persistence for everything a training run leaves behind
// apart from the weights themselves (see checkpoint.rs).
//
// File layout of an artifact directory:
//   models/
//     model.mpk.gz          ← weights (gzip'd half precision)
//     model_config.json     ← n_features / n_classes
//     train_config.json     ← flags the run was started with
//     label_map.json        ← class index → diagnosis code
//     feature_schema.json   ← layout of the feature vector
//     encoding_map.json     ← column → category labels
//     age_scaler.json       ← fitted min / max of age
//     evaluation.json       ← classification report
//     metrics.csv           ← one row per epoch
//
// Every file is pretty-printed with a trailing newline, so two
// writes of the same value produce the same bytes.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json documentation (to_string_pretty)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{
    encoding::{AgeScaler, EncodingMap, LabelMap},
    feature_vector::FeatureSchema,
    traits::Persistable,
};

pub const LABEL_MAP_FILE:      &str = "label_map.json";
pub const FEATURE_SCHEMA_FILE: &str = "feature_schema.json";
pub const ENCODING_MAP_FILE:   &str = "encoding_map.json";
pub const AGE_SCALER_FILE:     &str = "age_scaler.json";
pub const EVALUATION_FILE:     &str = "evaluation.json";

/// Serialise `value` as pretty JSON into `path`, creating parent dirs.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    fs::write(path, json)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("'{}' is not valid JSON for this artifact", path.display()))
}

// Every JSON artifact persists the same way
macro_rules! impl_json_persistable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Persistable for $ty {
                fn save(&self, path: &Path) -> Result<()> {
                    write_json(path, self)
                }

                fn load(path: &Path) -> Result<Self> {
                    read_json(path)
                }
            }
        )*
    };
}

impl_json_persistable!(EncodingMap, AgeScaler, LabelMap, FeatureSchema);

/// Paths inside one artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn label_map_path(&self) -> PathBuf {
        self.dir.join(LABEL_MAP_FILE)
    }

    pub fn feature_schema_path(&self) -> PathBuf {
        self.dir.join(FEATURE_SCHEMA_FILE)
    }

    pub fn encoding_map_path(&self) -> PathBuf {
        self.dir.join(ENCODING_MAP_FILE)
    }

    pub fn age_scaler_path(&self) -> PathBuf {
        self.dir.join(AGE_SCALER_FILE)
    }

    pub fn evaluation_path(&self) -> PathBuf {
        self.dir.join(EVALUATION_FILE)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_creates_parent_and_ends_with_newline() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/scaler.json");
        AgeScaler { min: 0.0, max: 85.0 }.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert_eq!(AgeScaler::load(&path).unwrap(), AgeScaler { min: 0.0, max: 85.0 });
    }

    #[test]
    fn test_label_map_persists() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let map   = LabelMap::fit(["nv", "mel", "bkl"]);
        map.save(&store.label_map_path()).unwrap();
        assert_eq!(LabelMap::load(&store.label_map_path()).unwrap(), map);
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = read_json::<FeatureSchema>(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, "not json").unwrap();
        assert!(FeatureSchema::load(&path).is_err());
    }
}
