// ============================================================
// Layer 4 — Feature Encoder
// ============================================================
// Turns one record's raw fields into a FeatureVector.
//
//   age          → AgeScaler (min/max fitted by preprocessing)
//   sex          → EncodingMap "sex", unknown on miss
//   localization → EncodingMap "localization", unknown on miss
//   image        → RGB, 64×64 Catmull-Rom resize, raw buffer
//                  order (row, column, channel), / 255.0
//
// The same image function runs for a file on disk (training)
// and for uploaded bytes (serving), so both paths produce
// identical pixels for identical input images.
//
// Reference: image crate docs (imageops::resize, FilterType)

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};
use std::path::Path;

use crate::domain::encoding::{AgeScaler, EncodingMap};
use crate::domain::feature_vector::{
    FeatureVector, ImageFeatures, MetadataFeatures, IMAGE_SIDE,
};
use crate::domain::record::CleanedRecord;
use crate::domain::vocabulary::{LOCALIZATION_UNKNOWN, SEX_UNKNOWN};

/// Applies the persisted encoding tables to one record.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    encoding_map: EncodingMap,
    age_scaler:   AgeScaler,
}

impl FeatureEncoder {
    /// Build from persisted tables. A map without `sex` or
    /// `localization` gets the fixed vocabulary for that column.
    pub fn new(mut encoding_map: EncodingMap, age_scaler: AgeScaler) -> Self {
        let fixed = EncodingMap::with_fixed_vocabularies();
        for column in ["sex", "localization"] {
            if encoding_map.labels(column).is_none() {
                if let Some(labels) = fixed.labels(column) {
                    encoding_map.insert(column, labels.to_vec());
                }
            }
        }
        Self { encoding_map, age_scaler }
    }

    pub fn encode_age(&self, age: f64) -> f32 {
        self.age_scaler.transform(age) as f32
    }

    pub fn encode_sex(&self, sex: Option<&str>) -> u32 {
        self.encoding_map
            .encode_or_unknown("sex", sex)
            .unwrap_or(SEX_UNKNOWN)
    }

    pub fn encode_localization(&self, localization: Option<&str>) -> u32 {
        self.encoding_map
            .encode_or_unknown("localization", localization)
            .unwrap_or(LOCALIZATION_UNKNOWN)
    }

    /// Encode raw request metadata
    pub fn metadata(
        &self,
        age:          f64,
        sex:          Option<&str>,
        localization: Option<&str>,
    ) -> MetadataFeatures {
        MetadataFeatures {
            age:          self.encode_age(age),
            sex:          self.encode_sex(sex),
            localization: self.encode_localization(localization),
        }
    }

    /// Full feature vector for one raw record
    pub fn encode(
        &self,
        age:          f64,
        sex:          Option<&str>,
        localization: Option<&str>,
        image:        &ImageFeatures,
    ) -> FeatureVector {
        FeatureVector::assemble(self.metadata(age, sex, localization), image)
    }
}

/// Metadata of a row that preprocessing already encoded and normalised
pub fn metadata_from_cleaned(row: &CleanedRecord) -> MetadataFeatures {
    MetadataFeatures {
        age:          row.age as f32,
        sex:          row.sex,
        localization: row.localization,
    }
}

// ─── Image features ───────────────────────────────────────────────────────────

/// Open an image file and encode it
pub fn image_features_from_path(path: &Path) -> Result<ImageFeatures> {
    let img = image::open(path)
        .with_context(|| format!("Cannot open image '{}'", path.display()))?;
    image_features(&img)
}

/// Decode an in-memory image (any format the image crate knows) and encode it
pub fn image_features_from_bytes(bytes: &[u8]) -> Result<ImageFeatures> {
    let img = image::load_from_memory(bytes).context("Cannot decode image bytes")?;
    image_features(&img)
}

fn image_features(img: &DynamicImage) -> Result<ImageFeatures> {
    let rgb     = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, IMAGE_SIDE, IMAGE_SIDE, FilterType::CatmullRom);

    // into_raw() is row-major with interleaved channels: R,G,B,R,G,B,...
    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    ImageFeatures::new(pixels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::feature_vector::{FEATURE_LEN, IMAGE_LEN};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// A small solid-colour JPEG, used by tests across the crate
    pub(crate) fn jpeg_bytes(color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(32, 32, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Jpeg)
            .unwrap();
        buf.into_inner()
    }

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::new(
            EncodingMap::with_fixed_vocabularies(),
            AgeScaler { min: 0.0, max: 85.0 },
        )
    }

    #[test]
    fn test_metadata_encoding() {
        let m = encoder().metadata(42.5, Some("MALE"), Some("back"));
        assert_eq!(m.age, 0.5);
        assert_eq!(m.sex, 1);
        assert_eq!(m.localization, 2);
    }

    #[test]
    fn test_unknown_fallbacks() {
        let e = encoder();
        assert_eq!(e.encode_sex(Some("x")), 2);
        assert_eq!(e.encode_sex(None), 2);
        assert_eq!(e.encode_localization(Some("knee")), 13);
        assert_eq!(e.encode_localization(None), 13);
    }

    #[test]
    fn test_map_without_fixed_columns_gets_them() {
        let e = FeatureEncoder::new(EncodingMap::new(), AgeScaler { min: 0.0, max: 1.0 });
        assert_eq!(e.encode_sex(Some("female")), 0);
        assert_eq!(e.encode_localization(Some("upper extremity")), 14);
    }

    #[test]
    fn test_image_bytes_shape_and_range() {
        let feats = image_features_from_bytes(&jpeg_bytes([255, 0, 0])).unwrap();
        assert_eq!(feats.as_slice().len(), IMAGE_LEN);
        assert!(feats.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        // Pixel-major: first three values are R,G,B of pixel (0,0)
        let px = &feats.as_slice()[..3];
        assert!(px[0] > 0.9 && px[1] < 0.1 && px[2] < 0.1, "{px:?}");
    }

    #[test]
    fn test_path_and_bytes_agree() {
        let dir   = tempfile::tempdir().unwrap();
        let path  = dir.path().join("img.jpg");
        let bytes = jpeg_bytes([10, 120, 200]);
        std::fs::write(&path, &bytes).unwrap();

        let from_path  = image_features_from_path(&path).unwrap();
        let from_bytes = image_features_from_bytes(&bytes).unwrap();
        assert_eq!(from_path, from_bytes);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(image_features_from_bytes(b"definitely not an image").is_err());
        assert!(image_features_from_path(Path::new("/no/such/file.jpg")).is_err());
    }

    #[test]
    fn test_full_vector() {
        let img = image_features_from_bytes(&jpeg_bytes([0, 0, 0])).unwrap();
        let v   = encoder().encode(85.0, Some("female"), Some("face"), &img);
        assert_eq!(v.len(), FEATURE_LEN);
        assert_eq!(&v.as_slice()[..3], &[1.0, 0.0, 5.0]);
    }
}
