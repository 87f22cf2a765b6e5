// ============================================================
// Layer 4 — Latent Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<LatentSample>
// into device tensors.
//
// How batching works here:
//   Input:  Vec of B LatentSamples, each code flattened to
//           n_latents * latent_dim values
//   Output: LatentBatch with
//             latents    [B, n_latents, latent_dim]
//             transforms [B, 3, 3]        (when present)
//             indices    source rows, in batch order
//
//   We flatten all codes into one long Vec, then reshape:
//   [s1_v1, ..., s1_vK, s2_v1, ..., sB_vK] → [B, n, d]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::latent::LatentSample;

// ─── LatentBatch ──────────────────────────────────────────────────────────────
/// A batch of latent codes ready for the mapper.
#[derive(Debug, Clone)]
pub struct LatentBatch<B: Backend> {
    /// Latent codes — shape: [batch_size, n_latents, latent_dim]
    pub latents: Tensor<B, 3>,

    /// Per-sample 3x3 transforms — shape: [batch_size, 3, 3]
    /// None when the run has no transform file
    pub transforms: Option<Tensor<B, 3>>,

    /// Row of each sample in the latent file
    pub indices: Vec<usize>,
}

// ─── LatentBatcher ────────────────────────────────────────────────────────────
/// Holds the per-sample latent shape so codes can be reshaped.
#[derive(Clone, Debug)]
pub struct LatentBatcher {
    pub n_latents:  usize,
    pub latent_dim: usize,
}

impl LatentBatcher {
    pub fn new(n_latents: usize, latent_dim: usize) -> Self {
        Self { n_latents, latent_dim }
    }
}

impl<B: Backend> Batcher<B, LatentSample, LatentBatch<B>> for LatentBatcher {
    fn batch(&self, items: Vec<LatentSample>, device: &B::Device) -> LatentBatch<B> {
        let batch_size = items.len();

        // ── Flatten latent codes ──────────────────────────────────────────────
        let codes: Vec<f32> = items
            .iter()
            .flat_map(|s| s.code.iter().copied())
            .collect();

        let latents = Tensor::<B, 3>::from_data(
            TensorData::new(codes, [batch_size, self.n_latents, self.latent_dim]),
            device,
        );

        // ── Transforms: only when every sample has one ────────────────────────
        let transforms = if !items.is_empty() && items.iter().all(|s| s.transform.is_some()) {
            let flat: Vec<f32> = items
                .iter()
                .filter_map(|s| s.transform)
                .flat_map(|t| t.into_iter())
                .collect();
            Some(Tensor::<B, 3>::from_data(
                TensorData::new(flat, [batch_size, 3, 3]),
                device,
            ))
        } else {
            None
        };

        let indices = items.iter().map(|s| s.index).collect();

        LatentBatch { latents, transforms, indices }
    }
}
