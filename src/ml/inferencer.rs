// ============================================================
// Layer 5 — Inferencer
// ============================================================
// FrozenClassifier is a plain-Vec snapshot of a trained
// LesionClassifier: the weight matrix and bias copied out of
// the burn tensors once, at load time.
//
// Serving classifies one record per request. A snapshot is
// Send + Sync with no interior state, so the HTTP handlers can
// share one through an Arc and call it from any thread.
//
//   logits[c] = bias[c] + Σ_i x[i] · W[i, c]
//   p         = softmax(logits)      (max-shifted, stable)
//
// Reference: Burn Book §6 (Inference)

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::domain::feature_vector::FeatureVector;
use crate::domain::traits::DiagnosisClassifier;
use crate::ml::model::LesionClassifier;

#[derive(Debug, Clone)]
pub struct FrozenClassifier {
    n_features: usize,
    n_classes:  usize,
    /// Row-major [n_features × n_classes]
    weights:    Vec<f32>,
    bias:       Vec<f32>,
}

impl FrozenClassifier {
    pub fn from_model<B: Backend>(model: &LesionClassifier<B>) -> Self {
        let weight = model.linear.weight.val();
        let [n_features, n_classes] = weight.dims();

        let weights: Vec<f32> = weight.into_data().iter::<f32>().collect();
        let bias: Vec<f32> = match &model.linear.bias {
            Some(b) => b.val().into_data().iter::<f32>().collect(),
            None    => vec![0.0; n_classes],
        };

        Self { n_features, n_classes, weights, bias }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl DiagnosisClassifier for FrozenClassifier {
    fn num_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f32>> {
        let x = features.as_slice();
        if x.len() != self.n_features {
            bail!(
                "Feature vector has {} values, model expects {}",
                x.len(),
                self.n_features
            );
        }

        let mut logits = self.bias.clone();
        for (row, &xi) in self.weights.chunks_exact(self.n_classes).zip(x) {
            if xi == 0.0 {
                continue;
            }
            for (logit, &w) in logits.iter_mut().zip(row) {
                *logit += xi * w;
            }
        }

        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_vector::{ImageFeatures, MetadataFeatures, FEATURE_LEN, IMAGE_LEN};
    use crate::ml::model::LesionClassifierConfig;
    use crate::ml::InferBackend;
    use burn::module::Param;

    fn vector() -> FeatureVector {
        let meta   = MetadataFeatures { age: 0.4, sex: 1, localization: 2 };
        let pixels = (0..IMAGE_LEN).map(|i| (i % 255) as f32 / 255.0).collect();
        FeatureVector::assemble(meta, &ImageFeatures::new(pixels).unwrap())
    }

    /// A model with small non-zero weights, so the two paths have work to agree on
    fn trained_like() -> LesionClassifier<InferBackend> {
        let device = Default::default();
        let mut model: LesionClassifier<InferBackend> =
            LesionClassifierConfig::new(FEATURE_LEN, 3).init(&device);

        let weights: Vec<f32> = (0..FEATURE_LEN * 3)
            .map(|i| ((i % 7) as f32 - 3.0) * 1e-4)
            .collect();
        model.linear.weight = Param::from_tensor(Tensor::from_data(
            TensorData::new(weights, [FEATURE_LEN, 3]),
            &device,
        ));
        model.linear.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(vec![0.1f32, -0.2, 0.05], [3]),
            &device,
        )));
        model
    }

    #[test]
    fn test_matches_burn_probabilities() {
        let model  = trained_like();
        let frozen = FrozenClassifier::from_model(&model);
        assert_eq!(frozen.num_classes(), 3);
        assert_eq!(frozen.n_features(), FEATURE_LEN);

        let v = vector();
        let x = Tensor::<InferBackend, 2>::from_data(
            TensorData::new(v.as_slice().to_vec(), [1, FEATURE_LEN]),
            &model.device(),
        );
        let expected: Vec<f32> = model.probabilities(x).into_data().iter::<f32>().collect();
        let actual = frozen.predict_proba(&v).unwrap();

        for (a, e) in actual.iter().zip(&expected) {
            assert!((a - e).abs() < 1e-4, "{a} vs {e}");
        }
        assert!((actual.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_model_is_uniform() {
        let model: LesionClassifier<InferBackend> =
            LesionClassifierConfig::new(FEATURE_LEN, 7).init(&Default::default());
        let (index, confidence) = FrozenClassifier::from_model(&model).predict(&vector()).unwrap();
        assert_eq!(index, 0);
        assert!((confidence - 1.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let model: LesionClassifier<InferBackend> =
            LesionClassifierConfig::new(5, 2).init(&Default::default());
        assert!(FrozenClassifier::from_model(&model).predict_proba(&vector()).is_err());
    }
}
