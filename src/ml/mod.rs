// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn model, the training loop and
// the inference snapshot. Tensors appear here and in the
// batcher; everything else works on plain FeatureVectors.
//
// What's in this layer:
//
//   model.rs      — Multinomial logistic regression
//                   • one Linear layer, zero-initialised
//                   • softmax probabilities
//                   • cross-entropy loss
//
//   trainer.rs    — The training loop
//                   Seeded batch shuffling, Adam updates,
//                   per-epoch validation and metrics rows
//
//   inferencer.rs — FrozenClassifier
//                   Weight snapshot used by the prediction
//                   service, one record at a time
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Training backend: NdArray with automatic differentiation
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// Inference backend: plain NdArray on the CPU
pub type InferBackend = burn::backend::NdArray;

/// Logistic regression model architecture
pub mod model;

/// Training loop with validation and metrics
pub mod trainer;

/// Frozen weights for serving
pub mod inferencer;
