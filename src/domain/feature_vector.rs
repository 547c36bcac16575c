// ============================================================
// Layer 3 — Feature Vector Schema
// ============================================================
// The layout of the numeric vector the classifier consumes:
//
//   index 0          normalised age
//   index 1          sex code
//   index 2          localization code
//   index 3..12291   64×64×3 RGB pixels / 255, pixel-major
//                    (row, column, channel)
//
// Training and serving both build vectors ONLY through
// FeatureVector::assemble, so the order lives in one place.
// FeatureSchema is the persisted description of this layout;
// the inferencer refuses a model whose saved schema differs
// from the one compiled into the binary.
//
// Bump SCHEMA_VERSION whenever the layout changes.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Side length of the square image the encoder resizes to
pub const IMAGE_SIDE: u32 = 64;

/// RGB
pub const IMAGE_CHANNELS: usize = 3;

pub const IMAGE_LEN: usize = (IMAGE_SIDE as usize) * (IMAGE_SIDE as usize) * IMAGE_CHANNELS;

/// Metadata fields, in vector order
pub const METADATA_FIELDS: [&str; 3] = ["age", "sex", "localization"];

pub const FEATURE_LEN: usize = METADATA_FIELDS.len() + IMAGE_LEN;

// ─── FeatureSchema ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version:        u32,
    pub metadata:       Vec<String>,
    pub image_side:     u32,
    pub image_channels: usize,
    pub pixel_order:    String,
    pub len:            usize,
}

impl FeatureSchema {
    /// The layout this binary produces
    pub fn current() -> Self {
        Self {
            version:        SCHEMA_VERSION,
            metadata:       METADATA_FIELDS.iter().map(|s| s.to_string()).collect(),
            image_side:     IMAGE_SIDE,
            image_channels: IMAGE_CHANNELS,
            pixel_order:    "hwc".to_string(),
            len:            FEATURE_LEN,
        }
    }

    /// Fail if a persisted schema does not match this binary's layout
    pub fn ensure_compatible(&self) -> Result<()> {
        let current = Self::current();
        if *self != current {
            bail!(
                "feature schema mismatch: artifacts use v{} ({} features), binary uses v{} ({} features)",
                self.version, self.len, current.version, current.len
            );
        }
        Ok(())
    }
}

// ─── Parts ────────────────────────────────────────────────────────────────────
/// Encoded metadata of one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataFeatures {
    pub age:          f32,
    pub sex:          u32,
    pub localization: u32,
}

/// Flattened, normalised pixels. Length is always IMAGE_LEN.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFeatures(Vec<f32>);

impl ImageFeatures {
    pub fn new(pixels: Vec<f32>) -> Result<Self> {
        if pixels.len() != IMAGE_LEN {
            bail!("image features must have {} values, got {}", IMAGE_LEN, pixels.len());
        }
        Ok(Self(pixels))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

// ─── FeatureVector ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// The one place the vector layout is decided
    pub fn assemble(meta: MetadataFeatures, image: &ImageFeatures) -> Self {
        let mut values = Vec::with_capacity(FEATURE_LEN);
        values.push(meta.age);
        values.push(meta.sex as f32);
        values.push(meta.localization as f32);
        values.extend_from_slice(image.as_slice());
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_len() {
        assert_eq!(FEATURE_LEN, 12_291);
        assert_eq!(FeatureSchema::current().len, FEATURE_LEN);
    }

    #[test]
    fn test_assemble_field_order() {
        let meta  = MetadataFeatures { age: 0.5, sex: 1, localization: 2 };
        let mut pixels = vec![0.0; IMAGE_LEN];
        pixels[0] = 0.25;
        let image = ImageFeatures::new(pixels).unwrap();

        let v = FeatureVector::assemble(meta, &image);
        assert_eq!(v.len(), FEATURE_LEN);
        assert_eq!(&v.as_slice()[..4], &[0.5, 1.0, 2.0, 0.25]);
    }

    #[test]
    fn test_image_features_length_checked() {
        assert!(ImageFeatures::new(vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_schema_compatibility() {
        assert!(FeatureSchema::current().ensure_compatible().is_ok());

        let mut old = FeatureSchema::current();
        old.image_side = 32;
        assert!(old.ensure_compatible().is_err());
    }
}
