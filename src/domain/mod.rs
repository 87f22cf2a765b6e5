// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define the core concepts
// of an inference run.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Latent codes and transforms as read from disk
pub mod latent;

// Stored training options, test options, and how they merge
pub mod options;

// Core abstractions (traits) that other layers implement
pub mod traits;
