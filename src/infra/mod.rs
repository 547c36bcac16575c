// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles the cross-cutting concerns that don't belong in any
// specific business layer:
//
//   checkpoint.rs     — Saving and loading model weights
//                       Burn file recorders plus the ordered
//                       ModelLoader fallback. Also saves the
//                       model config so inference can rebuild
//                       the model before loading weights.
//
//   artifact_store.rs — JSON artifacts
//                       Label map, feature schema, encoding
//                       map, age scaler, evaluation report.
//
//   metrics.rs        — Training metrics
//                       Epoch-level CSV log and the final
//                       classification report.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model weight saving and loading
pub mod checkpoint;

/// JSON persistence of encoders, schema and reports
pub mod artifact_store;

/// Training metrics CSV logger and classification report
pub mod metrics;
