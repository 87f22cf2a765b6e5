// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   checkpoint.rs — Mapper checkpoints
//                   Loads the stored option bag (opts.json)
//                   and the model weights (Burn record).
//
//   output.rs     — Per-sample artifacts
//                   Images as JPEG, edited latents as .npy,
//                   zero-padded names in inference_results/.
//
//   metrics.rs    — Runtime statistics
//                   Per-batch forward timings, summarised
//                   into stats.txt.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Checkpoint options and weights
pub mod checkpoint;

/// Image and latent writers
pub mod output;

/// Batch timing statistics
pub mod metrics;
