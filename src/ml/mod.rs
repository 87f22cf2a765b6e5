// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model code lives here.
//
// What's in this layer:
//
//   mapper.rs     — EqualLinear, PixelNorm, Mapper and the
//                   single / levels mapper layouts that
//                   predict latent edit directions
//
//   synthesis.rs  — The decoder: Fourier-feature input layer
//                   (with per-sample transform), modulated
//                   convolutions, ToRGB
//
//   model.rs      — StyleClipMapper = mapper + decoder, and
//                   the edit rule w + 0.1 · mapper(w)
//
//   inferencer.rs — Builds the model from options, loads the
//                   checkpoint, runs batches, copies results
//                   back to host memory
//
// Reference: Burn Book §3 (Building Blocks)
//            Patashnik et al. (2021) StyleCLIP
//            Karras et al. (2021) Alias-Free GAN

/// Latent mappers
pub mod mapper;

/// Synthesis network (decoder)
pub mod synthesis;

/// Mapper + decoder composition and the edit rule
pub mod model;

/// Inference engine — loads a checkpoint and edits batches
pub mod inferencer;
