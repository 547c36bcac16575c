// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts
// of the system.
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits
//
// Think of this layer as the "dictionary" of the system:
// it defines what things ARE, not how they work.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Raw and cleaned metadata rows
pub mod record;

// Fixed sex / body-site / diagnosis tables
pub mod vocabulary;

// Encoding map, age scaler, label map
pub mod encoding;

// The feature vector layout shared by training and serving
pub mod feature_vector;

// Core abstractions (traits) that other layers implement
pub mod traits;
