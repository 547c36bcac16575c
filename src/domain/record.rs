// ============================================================
// Layer 3 — Lesion Record Types
// ============================================================
// Two views of one HAM10000 lesion observation:
//
//   RawRecord     — straight out of the metadata CSV after
//                   trimming; every field may still be missing
//   CleanedRecord — one row of the preprocessed table: imputed,
//                   integer-encoded, age normalised, image path
//                   resolved
//
// CleanedRecord's field order IS the column order of the
// cleaned CSV (serde writes fields in declaration order).
//
// Reference: Rust Book §5 (Structs), serde derive docs

use serde::{Deserialize, Serialize};

/// Columns that must be present in the raw metadata CSV
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "lesion_id",
    "image_id",
    "dx",
    "dx_type",
    "age",
    "sex",
    "localization",
];

/// Categorical columns encoded through the Encoding Map
pub const CATEGORICAL_COLUMNS: [&str; 4] = ["sex", "localization", "dx", "dx_type"];

/// A raw metadata row. `None` means the cell was empty.
///
/// `age` stays a string here so a non-numeric cell can be
/// treated as missing by the imputer instead of failing the load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub lesion_id:    Option<String>,
    pub image_id:     Option<String>,
    pub dx:           Option<String>,
    pub dx_type:      Option<String>,
    pub age:          Option<String>,
    pub sex:          Option<String>,
    pub localization: Option<String>,
}

impl RawRecord {
    /// Read a categorical column by name
    pub fn categorical(&self, column: &str) -> Option<&str> {
        match column {
            "sex"          => self.sex.as_deref(),
            "localization" => self.localization.as_deref(),
            "dx"           => self.dx.as_deref(),
            "dx_type"      => self.dx_type.as_deref(),
            _              => None,
        }
    }

    /// Mutable access to a categorical column by name
    pub fn categorical_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        match column {
            "sex"          => Some(&mut self.sex),
            "localization" => Some(&mut self.localization),
            "dx"           => Some(&mut self.dx),
            "dx_type"      => Some(&mut self.dx_type),
            _              => None,
        }
    }

    /// Parse the age cell. Empty and non-numeric cells are `None`.
    pub fn parsed_age(&self) -> Option<f64> {
        self.age
            .as_deref()
            .and_then(|a| a.parse::<f64>().ok())
            .filter(|a| a.is_finite())
    }
}

/// One row of the cleaned, encoded metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub lesion_id:        String,
    pub image_id:         String,
    pub dx:               u32,
    pub dx_type:          u32,
    /// Min-max normalised age
    pub age:              f64,
    pub sex:              u32,
    pub localization:     u32,
    pub age_outlier_flag: u8,
    pub image_path:       String,
}
