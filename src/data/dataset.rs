// ============================================================
// Layer 4 — Latents Dataset
// ============================================================
// Burn Dataset over the in-memory latent set. Items come out in
// file order; the loader is never shuffled.
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::{transform::PartialDataset, Dataset};

use crate::domain::latent::{LatentSample, LatentSet};

/// In-memory dataset of latent codes, indexed in file order.
pub struct LatentsDataset {
    samples: Vec<LatentSample>,
}

impl LatentsDataset {
    pub fn new(set: LatentSet) -> Self {
        Self { samples: set.samples }
    }

    /// Restrict to the first `floor(len / batch_size) * batch_size`
    /// samples, so every batch the loader builds is full.
    pub fn into_full_batches(self, batch_size: usize) -> PartialDataset<Self, LatentSample> {
        let end = full_batch_len(self.samples.len(), batch_size);
        PartialDataset::new(self, 0, end)
    }
}

impl Dataset<LatentSample> for LatentsDataset {
    fn get(&self, index: usize) -> Option<LatentSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Number of samples covered by full batches of `batch_size`.
pub fn full_batch_len(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    (len / batch_size) * batch_size
}
