// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their flags:
//
//   preprocess  metadata CSV → cleaned table + encoders
//   train       cleaned table → model artifacts
//   serve       HTTP prediction service
//   predict     classify one local image from the terminal
//
// Every default is the conventional HAM10000 layout, so the
// whole pipeline runs without a single flag.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, PathBuf, ...)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{
    predict_use_case::PredictionRequest,
    preprocess_use_case::PreprocessConfig,
    train_use_case::TrainConfig,
};
use crate::infra::checkpoint::ModelFormat;

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean and encode the HAM10000 metadata
    Preprocess(PreprocessArgs),

    /// Train the lesion classifier on the preprocessed table
    Train(TrainArgs),

    /// Serve predictions over HTTP
    Serve(ServeArgs),

    /// Classify one image with the trained artifacts
    Predict(PredictArgs),
}

/// All arguments for the `preprocess` command.
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Raw HAM10000 metadata CSV
    #[arg(long, default_value = "data/HAM10000_metadata.csv")]
    pub metadata: PathBuf,

    /// Directory holding <image_id>.jpg files
    #[arg(long, default_value = "data/HAM10000_images_part_1")]
    pub images_dir: PathBuf,

    /// Where the cleaned table is written
    #[arg(long, default_value = "data/HAM10000_metadata_preprocessed.csv")]
    pub output: PathBuf,

    /// Where the encoding map is written
    #[arg(long, default_value = "data/label_encoders.json")]
    pub encoders: PathBuf,

    /// Where the fitted age scaler is written
    #[arg(long, default_value = "data/age_scaler.json")]
    pub age_scaler: PathBuf,
}

impl From<PreprocessArgs> for PreprocessConfig {
    fn from(a: PreprocessArgs) -> Self {
        PreprocessConfig {
            metadata_csv:      a.metadata,
            images_dir:        a.images_dir,
            output_csv:        a.output,
            encoding_map_path: a.encoders,
            age_scaler_path:   a.age_scaler,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Cleaned table written by `preprocess`
    #[arg(long, default_value = "data/HAM10000_metadata_preprocessed.csv")]
    pub data: PathBuf,

    /// Encoding map written by `preprocess`
    #[arg(long, default_value = "data/label_encoders.json")]
    pub encoders: PathBuf,

    /// Age scaler written by `preprocess`
    #[arg(long, default_value = "data/age_scaler.json")]
    pub age_scaler: PathBuf,

    /// Directory for the model and everything that goes with it
    #[arg(long, default_value = "models")]
    pub artifacts_dir: PathBuf,

    /// Relative image paths in the table are resolved against this
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Use only the first N rows (0 = all). Reopening every image
    /// is the slow part of training.
    #[arg(long, default_value_t = 2000)]
    pub max_rows: usize,

    /// Fraction of each class held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Seed for the split and the batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Number of samples processed together in one update
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Weight file format: compact (model.mpk.gz) or full (model.mpk)
    #[arg(long, default_value = "compact")]
    pub format: ModelFormat,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2:
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            cleaned_csv:       a.data,
            encoding_map_path: a.encoders,
            age_scaler_path:   a.age_scaler,
            artifacts_dir:     a.artifacts_dir,
            data_root:         a.data_root,
            max_rows:          a.max_rows,
            test_fraction:     a.test_fraction,
            seed:              a.seed,
            epochs:            a.epochs,
            batch_size:        a.batch_size,
            lr:                a.lr,
            format:            a.format,
        }
    }
}

/// All arguments for the `serve` command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory written by `train`
    #[arg(long, default_value = "models")]
    pub artifacts_dir: PathBuf,

    /// Directory holding index.html
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub listen: String,
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Lesion photograph to classify
    #[arg(long)]
    pub image: PathBuf,

    /// Patient age in years
    #[arg(long)]
    pub age: String,

    /// female / male / unknown
    #[arg(long, default_value = "unknown")]
    pub sex: String,

    /// Body site, e.g. "back" or "lower extremity"
    #[arg(long, default_value = "unknown")]
    pub localization: String,

    /// Directory written by `train`
    #[arg(long, default_value = "models")]
    pub artifacts_dir: PathBuf,
}

impl PredictArgs {
    /// Everything but the image bytes, which the caller reads
    pub fn request(&self, image: Vec<u8>) -> PredictionRequest {
        PredictionRequest {
            age:          Some(self.age.clone()),
            sex:          Some(self.sex.clone()),
            localization: Some(self.localization.clone()),
            image:        Some(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["dermalume", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.max_rows, 2000);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.test_fraction, 0.2);
        assert_eq!(cfg.format, ModelFormat::Compact);
        assert_eq!(cfg.artifacts_dir, PathBuf::from("models"));
    }

    #[test]
    fn test_train_format_flag() {
        let cli = Cli::try_parse_from(["dermalume", "train", "--format", "full", "--max-rows", "0"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(args.format, ModelFormat::FullPrecision);
        assert_eq!(args.max_rows, 0);

        assert!(Cli::try_parse_from(["dermalume", "train", "--format", "onnx"]).is_err());
    }

    #[test]
    fn test_preprocess_defaults() {
        let cli = Cli::try_parse_from(["dermalume", "preprocess"]).unwrap();
        let Commands::Preprocess(args) = cli.command else { panic!("expected preprocess") };
        let cfg: PreprocessConfig = args.into();
        assert_eq!(cfg.metadata_csv, PathBuf::from("data/HAM10000_metadata.csv"));
        assert_eq!(cfg.encoding_map_path, PathBuf::from("data/label_encoders.json"));
    }

    #[test]
    fn test_predict_requires_image_and_age() {
        assert!(Cli::try_parse_from(["dermalume", "predict"]).is_err());
        let cli = Cli::try_parse_from(["dermalume", "predict", "--image", "a.jpg", "--age", "45"]).unwrap();
        let Commands::Predict(args) = cli.command else { panic!("expected predict") };
        let req = args.request(vec![1, 2, 3]);
        assert_eq!(req.sex.as_deref(), Some("unknown"));
        assert_eq!(req.image.map(|b| b.len()), Some(3));
    }
}
