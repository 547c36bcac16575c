// ============================================================
// Layer 4 — Feature Batcher
// ============================================================
// Stacks LabeledSamples into tensors for one forward pass.
//
//   Input:  N samples, each a FeatureVector of FEATURE_LEN
//   Output: FeatureBatch with
//             features [N, FEATURE_LEN]  (Float)
//             labels   [N]               (Int)
//
// Every FeatureVector already has the same length (the schema
// type guarantees it), so batching is a flatten + reshape.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;

use crate::data::dataset::LabeledSample;
use crate::domain::feature_vector::{FeatureVector, FEATURE_LEN};

/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct FeatureBatch<B: Backend> {
    /// shape: [batch_size, FEATURE_LEN]
    pub features: Tensor<B, 2>,
    /// shape: [batch_size]
    pub labels:   Tensor<B, 1, Int>,
}

/// Holds the target device so tensors are created in the right place.
#[derive(Clone, Debug)]
pub struct FeatureBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> FeatureBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Convert a slice of samples into one FeatureBatch.
    pub fn batch(&self, items: &[&LabeledSample]) -> FeatureBatch<B> {
        let vectors: Vec<&FeatureVector> = items.iter().map(|s| &s.features).collect();
        let features = self.features(&vectors);

        let labels: Vec<i64> = items.iter().map(|s| s.label as i64).collect();
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [items.len()]),
            &self.device,
        );

        FeatureBatch { features, labels }
    }

    /// Feature matrix only, for inference-style passes
    pub fn features(&self, vectors: &[&FeatureVector]) -> Tensor<B, 2> {
        let flat: Vec<f32> = vectors
            .iter()
            .flat_map(|v| v.as_slice().iter().copied())
            .collect();

        Tensor::<B, 2>::from_data(
            TensorData::new(flat, [vectors.len(), FEATURE_LEN]),
            &self.device,
        )
    }
}
