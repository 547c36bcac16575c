// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw metadata CSV to tensor batches.
//
//   HAM10000_metadata.csv
//       │
//       ▼
//   MetadataCsvLoader  → trims cells, checks required columns
//       │
//       ▼
//   Preprocessor       → impute, encode, flag, normalise,
//       │                resolve image paths
//       ▼
//   cleaned CSV + encoding map + age scaler   (on disk)
//       │
//       ▼
//   FeatureEncoder     → metadata + image → FeatureVector
//       │
//       ▼
//   stratified_split   → train / test
//       │
//       ▼
//   FeatureBatcher     → tensors for the training loop
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Batching)
//            Rust Book §13 (Iterators and Closures)

/// Reads the metadata CSV and the cleaned table
pub mod loader;

/// Imputation, encoding, outlier flags, normalisation, image paths
pub mod preprocessor;

/// Record → FeatureVector, shared by training and serving
pub mod encoder;

/// Labelled feature vectors
pub mod dataset;

/// Stacks samples into burn tensors
pub mod batcher;

/// Seeded stratified train/test split
pub mod splitter;
