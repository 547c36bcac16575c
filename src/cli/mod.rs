// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application);
// `serve` hands over to the axum server.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, PredictArgs, PreprocessArgs, ServeArgs, TrainArgs};
use std::sync::Arc;

/// The main CLI struct. clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "dermalume",
    version = "0.1.0",
    about = "Train a skin-lesion classifier on HAM10000 metadata and images, then serve it."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin: it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Train(args)      => run_train(args),
            Commands::Serve(args)      => run_serve(args),
            Commands::Predict(args)    => run_predict(args),
        }
    }
}

/// Handles the `preprocess` subcommand and prints what it did.
fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    use crate::application::preprocess_use_case::PreprocessUseCase;

    tracing::info!("Preprocessing metadata from: {}", args.metadata.display());
    let report = PreprocessUseCase::new(args.into()).execute()?;

    println!("Rows: {}", report.rows);
    for (column, n) in &report.imputed {
        println!("Imputed {:<13} {}", column, n);
    }
    println!("Age outliers flagged: {}", report.age_outliers);
    println!("Missing images: {}", report.missing_images.len());
    println!("Diagnosis counts:");
    for (dx, n) in &report.dx_counts {
        println!("  {:<6} {}", dx, n);
    }
    Ok(())
}

/// Handles the `train` subcommand.
/// Converts CLI args into a TrainConfig and hands off to Layer 2.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.data.display());
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "\nTrained on {} rows ({} train / {} test, {} dropped)",
        summary.rows_used, summary.train_samples, summary.test_samples, summary.rows_dropped
    );
    println!("{}", summary.report);
    println!("Model saved to {}", summary.model_path.display());
    Ok(())
}

/// Handles the `serve` subcommand: one tokio runtime for the server.
fn run_serve(args: ServeArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictionService;
    use crate::server::{serve, AppState};

    let service = Arc::new(PredictionService::load(&args.artifacts_dir));
    if !service.is_ready() {
        tracing::warn!(
            "Serving without a model: every prediction will fail until '{}' holds trained artifacts",
            args.artifacts_dir.display()
        );
    }
    let state   = Arc::new(AppState { service, static_dir: args.static_dir });

    let runtime = tokio::runtime::Runtime::new().context("Cannot start the tokio runtime")?;
    runtime.block_on(serve(&args.listen, state))
}

/// Handles the `predict` subcommand.
fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictionService;

    let image = std::fs::read(&args.image)
        .with_context(|| format!("Cannot read image '{}'", args.image.display()))?;

    let service    = PredictionService::load(&args.artifacts_dir);
    let prediction = service.classify(&args.request(image))?;

    println!(
        "\nPrediction: {} ({})\nConfidence: {:.3}",
        prediction.prediction, prediction.dx_full, prediction.confidence
    );
    Ok(())
}
