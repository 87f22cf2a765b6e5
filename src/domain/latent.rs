// ============================================================
// Layer 3 — Latent Domain Types
// ============================================================
// A LatentSet is everything read from the latent file (and the
// optional transform file) before any tensor is built:
//
//   LatentSet
//     ├── sample_shape: [n_latents, latent_dim]
//     └── samples: Vec<LatentSample>
//           ├── index      (row in the latent file)
//           ├── code       (flattened, len = product(sample_shape))
//           └── transform  (optional row-major 3x3 matrix)
//
// Reference: Rust Book §5 (Structs)

use anyhow::{bail, Result};

/// Row-major 3x3 transform fed to the synthesis input layer.
pub type Transform = [f32; 9];

/// The identity transform — used when no transform file is given.
pub const IDENTITY_TRANSFORM: Transform = [
    1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    0.0, 0.0, 1.0,
];

/// One latent code, still in host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct LatentSample {
    /// Position of this sample in the latent file
    pub index: usize,

    /// The latent code, flattened row-major
    pub code: Vec<f32>,

    /// Per-sample transform, when a transform file was supplied
    pub transform: Option<Transform>,
}

/// All latent codes of a run plus their common per-sample shape.
#[derive(Debug, Clone)]
pub struct LatentSet {
    pub sample_shape: Vec<usize>,
    pub samples:      Vec<LatentSample>,
}

impl LatentSet {
    /// Build a set, checking every code has `product(sample_shape)` values.
    pub fn new(sample_shape: Vec<usize>, samples: Vec<LatentSample>) -> Result<Self> {
        let expected: usize = sample_shape.iter().product();
        if let Some(bad) = samples.iter().find(|s| s.code.len() != expected) {
            bail!(
                "Latent {} has {} values, expected {} for shape {:?}",
                bad.index,
                bad.code.len(),
                expected,
                sample_shape
            );
        }
        Ok(Self { sample_shape, samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when every sample carries a transform.
    pub fn has_transforms(&self) -> bool {
        !self.samples.is_empty() && self.samples.iter().all(|s| s.transform.is_some())
    }

    /// Check the per-sample shape matches what the generator consumes.
    pub fn expect_shape(&self, n_latents: usize, latent_dim: usize) -> Result<()> {
        if self.sample_shape != [n_latents, latent_dim] {
            bail!(
                "Latent file holds codes of shape {:?}, but the model expects [{}, {}]",
                self.sample_shape,
                n_latents,
                latent_dim
            );
        }
        Ok(())
    }
}
