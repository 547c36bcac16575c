// ============================================================
// Layer 3 — Encoding Tables
// ============================================================
// The three small tables that must be identical at training
// time and at serving time:
//
//   EncodingMap — column name → ordered category labels
//                 (label position = integer code)
//   AgeScaler   — min/max fitted on the age column; the single
//                 canonical age normalisation
//   LabelMap    — class index → diagnosis code; the only way a
//                 model output is turned back into a label
//
// All three are plain serde structs. Persisting them is the
// infra layer's job (see infra::artifact_store).
//
// Reference: scikit-learn LabelEncoder / MinMaxScaler semantics
//            Rust Book §8 (Collections)

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::vocabulary::{
    DIAGNOSIS_CODES, LOCALIZATION_VOCAB, SEX_VOCAB, UNKNOWN_LABEL,
};

// ─── EncodingMap ──────────────────────────────────────────────────────────────
/// Column name → ordered category list.
///
/// Serialises as a plain JSON object; BTreeMap keeps the keys
/// sorted so the written file is byte-stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingMap {
    columns: BTreeMap<String, Vec<String>>,
}

impl EncodingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map pre-seeded with the fixed `sex` and `localization` tables
    pub fn with_fixed_vocabularies() -> Self {
        let mut map = Self::new();
        map.insert("sex", SEX_VOCAB.iter().map(|s| s.to_string()).collect());
        map.insert(
            "localization",
            LOCALIZATION_VOCAB.iter().map(|s| s.to_string()).collect(),
        );
        map
    }

    pub fn insert(&mut self, column: impl Into<String>, labels: Vec<String>) {
        self.columns.insert(column.into(), labels);
    }

    /// Fit a column the way a label encoder does: sorted unique values.
    /// Values are trimmed and lower-cased first, since lookups ignore case.
    pub fn fit_column<'a>(&mut self, column: &str, values: impl IntoIterator<Item = &'a str>) {
        let unique: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.trim().to_ascii_lowercase())
            .collect();
        self.insert(column, unique.into_iter().collect());
    }

    pub fn labels(&self, column: &str) -> Option<&[String]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    /// Exact (case-insensitive) lookup. `None` if the column or label is unknown.
    pub fn encode(&self, column: &str, value: &str) -> Option<u32> {
        let value = value.trim();
        self.columns
            .get(column)?
            .iter()
            .position(|label| label.eq_ignore_ascii_case(value))
            .map(|i| i as u32)
    }

    /// Code reserved for "unknown" in this column, if the column has one
    pub fn unknown_code(&self, column: &str) -> Option<u32> {
        self.encode(column, UNKNOWN_LABEL)
    }

    /// Look the value up, falling back to the column's unknown code.
    /// Missing values take the fallback too.
    pub fn encode_or_unknown(&self, column: &str, value: Option<&str>) -> Option<u32> {
        value
            .and_then(|v| self.encode(column, v))
            .or_else(|| self.unknown_code(column))
    }

    pub fn decode(&self, column: &str, code: u32) -> Option<&str> {
        self.columns
            .get(column)?
            .get(code as usize)
            .map(String::as_str)
    }
}

// ─── AgeScaler ────────────────────────────────────────────────────────────────
/// Min-max scaler for the age column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeScaler {
    pub min: f64,
    pub max: f64,
}

impl AgeScaler {
    /// Fit on a batch of ages. `None` for an empty batch.
    pub fn fit(ages: &[f64]) -> Option<Self> {
        let min = ages.iter().copied().reduce(f64::min)?;
        let max = ages.iter().copied().reduce(f64::max)?;
        Some(Self { min, max })
    }

    /// (age - min) / (max - min). Zero range maps everything to 0.
    /// Out-of-range ages are not clipped.
    pub fn transform(&self, age: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (age - self.min) / range
        }
    }
}

// ─── LabelMap ─────────────────────────────────────────────────────────────────
/// Ordered list of diagnosis codes; index = model class index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    pub classes: Vec<String>,
}

impl LabelMap {
    /// Sorted unique codes from the training targets
    pub fn fit<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let unique: BTreeSet<&str> = codes.into_iter().collect();
        Self { classes: unique.into_iter().map(str::to_string).collect() }
    }

    /// The hard-coded HAM10000 table, used only when nothing was persisted
    pub fn fallback() -> Self {
        Self { classes: DIAGNOSIS_CODES.iter().map(|s| s.to_string()).collect() }
    }

    pub fn encode(&self, code: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == code)
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_codes_any_casing() {
        let map = EncodingMap::with_fixed_vocabularies();
        for (input, code) in [
            ("female", 0), ("FEMALE", 0), ("Female", 0),
            ("male", 1), ("MaLe", 1),
            ("unknown", 2), ("UNKNOWN", 2),
        ] {
            assert_eq!(map.encode_or_unknown("sex", Some(input)), Some(code), "{input}");
        }
    }

    #[test]
    fn test_unrecognised_sex_maps_to_unknown() {
        let map = EncodingMap::with_fixed_vocabularies();
        assert_eq!(map.encode_or_unknown("sex", Some("other")), Some(2));
        assert_eq!(map.encode_or_unknown("sex", Some("")), Some(2));
        assert_eq!(map.encode_or_unknown("sex", None), Some(2));
    }

    #[test]
    fn test_localization_stable_and_unknown_is_13() {
        let map = EncodingMap::with_fixed_vocabularies();
        for (i, site) in LOCALIZATION_VOCAB.iter().enumerate() {
            let first  = map.encode_or_unknown("localization", Some(site));
            let second = map.encode_or_unknown("localization", Some(site));
            assert_eq!(first, Some(i as u32));
            assert_eq!(first, second);
        }
        assert_eq!(map.encode_or_unknown("localization", Some("elbow")), Some(13));
        assert_eq!(map.encode_or_unknown("localization", Some("Lower Extremity")), Some(9));
    }

    #[test]
    fn test_fit_column_sorts_and_dedups() {
        let mut map = EncodingMap::new();
        map.fit_column("dx", ["nv", "mel", "nv", "bkl"]);
        assert_eq!(map.labels("dx").unwrap(), &["bkl", "mel", "nv"]);
        assert_eq!(map.encode("dx", "nv"), Some(2));
        assert_eq!(map.decode("dx", 1), Some("mel"));
        // Fitted column without "unknown" has no fallback
        assert_eq!(map.encode_or_unknown("dx", Some("vasc")), None);
    }

    #[test]
    fn test_fit_column_folds_case() {
        let mut map = EncodingMap::new();
        map.fit_column("dx", ["NV", "nv", " mel", "Nv"]);
        assert_eq!(map.labels("dx"), Some(&["mel".to_string(), "nv".to_string()][..]));
        assert_eq!(map.encode("dx", "NV"), Some(1));
        assert_eq!(map.decode("dx", 1), Some("nv"));
    }

    #[test]
    fn test_encoding_map_serialises_as_plain_object() {
        let mut map = EncodingMap::new();
        map.fit_column("dx", ["mel", "nv"]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"dx":["mel","nv"]}"#);
    }

    #[test]
    fn test_age_scaler_fit_and_transform() {
        let s = AgeScaler::fit(&[0.0, 40.0, 80.0]).unwrap();
        assert_eq!(s.transform(40.0), 0.5);
        assert_eq!(s.transform(0.0), 0.0);
        assert_eq!(s.transform(80.0), 1.0);
        // Not clipped
        assert!(s.transform(100.0) > 1.0);
    }

    #[test]
    fn test_age_scaler_zero_range() {
        let s = AgeScaler::fit(&[50.0, 50.0]).unwrap();
        assert_eq!(s.transform(50.0), 0.0);
        assert!(AgeScaler::fit(&[]).is_none());
    }

    #[test]
    fn test_label_map_round_trip_every_code() {
        let map = LabelMap::fit(DIAGNOSIS_CODES.iter().copied());
        for code in DIAGNOSIS_CODES {
            let idx = map.encode(code).unwrap();
            assert_eq!(map.decode(idx), Some(code));
        }
        assert_eq!(map, LabelMap::fallback());
    }
}
