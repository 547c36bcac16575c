// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// specific goal each:
//
//   preprocess_use_case — raw metadata CSV → cleaned table,
//                         encoding map, age scaler
//   train_use_case      — cleaned table → model artifacts
//   predict_use_case    — artifacts → classify one record
//
// Rules for this layer:
//   - No ML math or model code here
//   - No HTTP or argument parsing here (Layer 1 / server)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The metadata cleaning workflow
pub mod preprocess_use_case;

// The training workflow
pub mod train_use_case;

// The single-record classification workflow
pub mod predict_use_case;
