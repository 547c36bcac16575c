// ============================================================
// Layer 5 — Lesion Classifier (multinomial logistic regression)
// ============================================================
// One Linear layer from the feature vector to one logit per
// diagnosis class, trained with softmax cross-entropy:
//
//   logits = x · W + b          W: [n_features, n_classes]
//   p      = softmax(logits)
//
// Weights start at zero. For a convex loss like this one that
// is the usual starting point, and it makes a training run
// reproducible without seeding the backend.
//
// Reference: Burn Book §3 (Building Blocks: Linear)

use burn::{
    nn::{loss::CrossEntropyLossConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally. Do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct LesionClassifierConfig {
    pub n_features: usize,
    pub n_classes:  usize,
}

impl LesionClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LesionClassifier<B> {
        let linear = LinearConfig::new(self.n_features, self.n_classes)
            .with_initializer(Initializer::Zeros)
            .init(device);
        LesionClassifier { linear }
    }
}

#[derive(Module, Debug)]
pub struct LesionClassifier<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> LesionClassifier<B> {
    /// features: [batch, n_features] → logits: [batch, n_classes]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(features)
    }

    /// Class probabilities, rows sum to 1
    pub fn probabilities(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        softmax(self.forward(features), 1)
    }

    /// Mean cross-entropy over the batch, plus the logits
    pub fn forward_loss(
        &self,
        features: Tensor<B, 2>,
        labels:   Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(features);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels);
        (loss, logits)
    }

    pub fn device(&self) -> B::Device {
        self.linear.weight.val().device()
    }

    pub fn n_classes(&self) -> usize {
        self.linear.weight.val().dims()[1]
    }
}
