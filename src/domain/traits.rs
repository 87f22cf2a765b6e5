// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to its collaborators through
// these traits, so the inference loop never needs to know
// which file format the latents came from or where results
// end up on disk.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::latent::LatentSet;

// ─── LatentSource ─────────────────────────────────────────────────────────────
/// Anything that can produce the latent codes of a run.
///
/// Implementations:
///   - NpyLatentLoader → `.npy` latent file + optional `.npy` transforms
pub trait LatentSource {
    /// Load every latent code (and transform, if any).
    fn load(&self) -> Result<LatentSet>;
}

// ─── ArtifactSink ─────────────────────────────────────────────────────────────
/// Anything that can persist the per-sample outputs of a batch.
///
/// Images arrive as CHW f32 in the generator's [-1, 1] range;
/// latents as flat f32 rows with their shape.
///
/// Implementations:
///   - OutputWriter → `{i:05}.jpg` + `latent_{i:05}.npy`
pub trait ArtifactSink {
    /// Write one sample. `tiles` holds one image, or two
    /// (reconstruction then edit) for coupled outputs.
    fn write_sample(
        &self,
        name_index:   usize,
        tiles:        &[&[f32]],
        image_chw:    [usize; 3],
        latent:       &[f32],
        latent_shape: &[usize],
    ) -> Result<()>;
}
