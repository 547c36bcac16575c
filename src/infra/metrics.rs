// ============================================================
// Layer 6 — Metrics
// ============================================================
// Two kinds of numbers come out of a training run:
//
//   EpochMetrics / MetricsLogger
//     one CSV row per epoch: loss and accuracy on the training
//     and the test split → <artifacts>/metrics.csv
//
//   ClassificationReport
//     the final evaluation: overall accuracy plus precision,
//     recall, F1 and support per diagnosis class
//     → <artifacts>/evaluation.json
//
// The report only covers labels that actually occur in the
// evaluated batch (in y_true or y_pred). A class the test split
// happens not to contain is skipped instead of producing 0/0.
//
// Example CSV output:
//   epoch,train_loss,val_loss,train_acc,val_acc
//   1,1.421800,1.398100,0.612000,0.605000
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::encoding::LabelMap;

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean cross-entropy over the training batches
    pub train_loss: f64,

    /// Mean cross-entropy on the test split
    pub val_loss: f64,

    /// Fraction of training samples classified correctly
    pub train_acc: f64,

    /// Fraction of test samples classified correctly
    pub val_acc: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        train_loss: f64,
        val_loss:   f64,
        train_acc:  f64,
        val_acc:    f64,
    ) -> Self {
        Self { epoch, train_loss, val_loss, train_acc, val_acc }
    }
}

/// Logs epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh metrics.csv in `dir` (one file per training run).
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,val_loss,train_acc,val_acc")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.train_acc, m.val_acc,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── ClassificationReport ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label:     String,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    /// Number of true samples of this class
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub total:    usize,
    pub classes:  Vec<ClassMetrics>,
}

impl ClassificationReport {
    /// Build the report for class indices `y_true` vs `y_pred`.
    /// Names come from `labels`; an index outside it is reported by number.
    pub fn compute(y_true: &[usize], y_pred: &[usize], labels: &LabelMap) -> Self {
        let total   = y_true.len().min(y_pred.len());
        let pairs   = || y_true.iter().zip(y_pred.iter()).take(total);
        let correct = pairs().filter(|(t, p)| t == p).count();

        // Only labels that occur somewhere in this batch
        let present: BTreeSet<usize> = pairs().flat_map(|(&t, &p)| [t, p]).collect();

        let classes = present
            .into_iter()
            .map(|class| {
                let tp      = pairs().filter(|(&t, &p)| t == class && p == class).count();
                let fp      = pairs().filter(|(&t, &p)| t != class && p == class).count();
                let support = pairs().filter(|(&t, _)| t == class).count();

                let precision = ratio(tp, tp + fp);
                let recall    = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: labels
                        .decode(class)
                        .map(str::to_string)
                        .unwrap_or_else(|| class.to_string()),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self { accuracy: ratio(correct, total), total, classes }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>10} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>10} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        write!(f, "{:>10} {:>32.2} {:>10}", "accuracy", self.accuracy, self.total)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelMap {
        LabelMap::fit(["bkl", "mel", "nv"])
    }

    #[test]
    fn test_logger_writes_header_and_rows() {
        let dir    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 1.0, 2.0, 0.5, 0.25)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        assert_eq!(
            text,
            "epoch,train_loss,val_loss,train_acc,val_acc\n\
             1,1.000000,2.000000,0.500000,0.250000\n"
        );
    }

    #[test]
    fn test_report_values() {
        // true: bkl mel nv nv ; pred: bkl nv nv nv
        let r = ClassificationReport::compute(&[0, 1, 2, 2], &[0, 2, 2, 2], &labels());
        assert_eq!(r.accuracy, 0.75);
        assert_eq!(r.classes.len(), 3);

        let nv = r.classes.iter().find(|c| c.label == "nv").unwrap();
        assert!((nv.precision - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(nv.recall, 1.0);
        assert_eq!(nv.support, 2);

        let mel = r.classes.iter().find(|c| c.label == "mel").unwrap();
        assert_eq!(mel.recall, 0.0);
        assert_eq!(mel.f1, 0.0);
    }

    #[test]
    fn test_report_skips_absent_classes() {
        // Only class 2 appears anywhere
        let r = ClassificationReport::compute(&[2, 2], &[2, 2], &labels());
        assert_eq!(r.classes.len(), 1);
        assert_eq!(r.classes[0].label, "nv");
        assert_eq!(r.accuracy, 1.0);
    }

    #[test]
    fn test_report_empty_input() {
        let r = ClassificationReport::compute(&[], &[], &labels());
        assert_eq!(r.total, 0);
        assert_eq!(r.accuracy, 0.0);
        assert!(r.classes.is_empty());
        // Display must not panic on an empty report
        let _ = r.to_string();
    }
}
