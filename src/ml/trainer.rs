// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Mini-batch training of the LesionClassifier with Adam.
//
//   - Training runs on TrainBackend (Autodiff<NdArray>)
//   - model.valid() gives the same weights on InferBackend
//     (plain NdArray) for the evaluation pass
//   - Batch order is shuffled every epoch with a StdRng seeded
//     from the run seed, so two runs with the same seed see the
//     same batches in the same order
//   - argmax(1) returns [batch,1] so we flatten before .equal()
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    backend::ndarray::NdArrayDevice,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::FeatureBatcher,
    dataset::{LabeledSample, LesionDataset},
};
use crate::domain::feature_vector::FEATURE_LEN;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{LesionClassifier, LesionClassifierConfig};
use crate::ml::{InferBackend, TrainBackend};

pub fn run_training(
    cfg:       &TrainConfig,
    n_classes: usize,
    train:     &LesionDataset,
    val:       &LesionDataset,
    logger:    &MetricsLogger,
) -> Result<LesionClassifier<InferBackend>> {
    if train.is_empty() {
        bail!("Training set is empty, nothing to fit");
    }
    if n_classes == 0 {
        bail!("Label map is empty, nothing to predict");
    }

    let device = NdArrayDevice::default();
    tracing::info!("Using NdArray device: {:?}", device);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: LesionClassifier<TrainBackend> =
        LesionClassifierConfig::new(FEATURE_LEN, n_classes).init(&device);
    tracing::info!("Model ready: {} features → {} classes", FEATURE_LEN, n_classes);

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let batch_size    = cfg.batch_size.max(1);
    let train_batcher = FeatureBatcher::<TrainBackend>::new(device);
    let mut rng       = StdRng::seed_from_u64(cfg.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        order.shuffle(&mut rng);

        let mut train_loss_sum = 0.0f64;
        let mut train_correct  = 0usize;

        for chunk in order.chunks(batch_size) {
            let items: Vec<&LabeledSample> =
                chunk.iter().filter_map(|&i| train.get(i)).collect();
            let batch = train_batcher.batch(&items);

            let (loss, logits) = model.forward_loss(batch.features, batch.labels.clone());

            // Sample-weighted so a short last batch counts for what it is
            train_loss_sum += loss.clone().into_scalar().elem::<f64>() * items.len() as f64;
            train_correct  += count_correct(logits, batch.labels);

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let train_loss = train_loss_sum / train.len() as f64;
        let train_acc  = train_correct as f64 / train.len() as f64;

        // ── Validation phase ──────────────────────────────────────────────────
        let (val_loss, val_acc) = evaluate(&model.valid(), val, batch_size);

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | train_acc={:.1}% | val_acc={:.1}%",
            epoch, cfg.epochs, train_loss, val_loss,
            train_acc * 100.0, val_acc * 100.0,
        );

        logger.log(&EpochMetrics::new(epoch, train_loss, val_loss, train_acc, val_acc))?;
    }

    tracing::info!("Training complete!");
    Ok(model.valid())
}

/// Mean loss and accuracy of `model` over `dataset`.
/// An empty dataset gives (NaN, 0.0).
pub fn evaluate<B: Backend>(
    model:      &LesionClassifier<B>,
    dataset:    &LesionDataset,
    batch_size: usize,
) -> (f64, f64) {
    if dataset.is_empty() {
        return (f64::NAN, 0.0);
    }

    let batcher = FeatureBatcher::<B>::new(model.device());
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;

    for chunk in dataset.samples().chunks(batch_size.max(1)) {
        let items: Vec<&LabeledSample> = chunk.iter().collect();
        let batch = batcher.batch(&items);
        let (loss, logits) = model.forward_loss(batch.features, batch.labels.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * items.len() as f64;
        correct  += count_correct(logits, batch.labels);
    }

    let n = dataset.len() as f64;
    (loss_sum / n, correct as f64 / n)
}

/// Predicted class index for every sample, in dataset order.
pub fn predict_classes<B: Backend>(
    model:      &LesionClassifier<B>,
    dataset:    &LesionDataset,
    batch_size: usize,
) -> Vec<usize> {
    let batcher = FeatureBatcher::<B>::new(model.device());
    let mut predictions = Vec::with_capacity(dataset.len());

    for chunk in dataset.samples().chunks(batch_size.max(1)) {
        let vectors: Vec<_> = chunk.iter().map(|s| &s.features).collect();
        let logits = model.forward(batcher.features(&vectors));
        predictions.extend(
            logits
                .argmax(1)
                .flatten::<1>(0, 1)
                .into_data()
                .iter::<i64>()
                .map(|c| c as usize),
        );
    }
    predictions
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns shape [batch, 1], squeeze to [batch]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted.equal(labels).int().sum().into_scalar().elem::<i64>() as usize
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_vector::{FeatureVector, ImageFeatures, MetadataFeatures, IMAGE_LEN};

    /// Two trivially separable classes: black images vs white images
    fn separable(n: usize) -> LesionDataset {
        let samples = (0..n)
            .map(|i| {
                let label = i % 2;
                let pixel = if label == 0 { 0.0 } else { 1.0 };
                let meta  = MetadataFeatures { age: 0.5, sex: 0, localization: 0 };
                let img   = ImageFeatures::new(vec![pixel; IMAGE_LEN]).unwrap();
                LabeledSample { features: FeatureVector::assemble(meta, &img), label }
            })
            .collect();
        LesionDataset::new(samples)
    }

    fn config(dir: &std::path::Path) -> TrainConfig {
        TrainConfig {
            epochs:     10,
            batch_size: 4,
            lr:         1e-2,
            ..TrainConfig::with_artifacts_dir(dir)
        }
    }

    #[test]
    fn test_training_learns_separable_data() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let train  = separable(16);
        let val    = separable(6);

        let model = run_training(&config(dir.path()), 2, &train, &val, &logger).unwrap();
        assert_eq!(predict_classes(&model, &val, 4), val.labels());

        let (_, acc) = evaluate(&model, &val, 4);
        assert_eq!(acc, 1.0);

        // header + one row per epoch
        let csv = std::fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 11);
    }

    #[test]
    fn test_empty_training_set_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        let empty  = LesionDataset::new(Vec::new());
        assert!(run_training(&config(dir.path()), 2, &empty, &empty, &logger).is_err());
    }

    #[test]
    fn test_evaluate_empty_dataset() {
        let model: LesionClassifier<InferBackend> =
            LesionClassifierConfig::new(FEATURE_LEN, 2).init(&Default::default());
        let (loss, acc) = evaluate(&model, &LesionDataset::new(Vec::new()), 8);
        assert!(loss.is_nan());
        assert_eq!(acc, 0.0);
    }
}
