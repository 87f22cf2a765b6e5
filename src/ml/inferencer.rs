// ============================================================
// Layer 5 — Inferencer
// ============================================================
use anyhow::Result;
use burn::prelude::*;

use crate::data::batcher::LatentBatch;
use crate::domain::options::InferenceOptions;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{EditOutput, StyleClipMapper, StyleClipMapperConfig};

/// A loaded mapper checkpoint, ready to edit batches on one device.
pub struct Inferencer<B: Backend> {
    model:  StyleClipMapper<B>,
    device: B::Device,
}

/// One batch of results copied to host memory.
pub struct HostBatch {
    /// Edited images, CHW per sample
    pub images:       Vec<Vec<f32>>,
    /// Unedited reconstructions, when coupled outputs were asked for
    pub recons:       Option<Vec<Vec<f32>>>,
    pub latents:      Vec<Vec<f32>>,
    pub image_chw:    [usize; 3],
    pub latent_shape: [usize; 2],
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: StyleClipMapper<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Build the architecture from `opts` and load the checkpoint weights.
    pub fn from_checkpoint(
        ckpt:   &CheckpointManager,
        opts:   &InferenceOptions,
        device: B::Device,
    ) -> Result<Self> {
        let config = StyleClipMapperConfig::from_options(opts);
        let model  = config.init::<B>(&device);
        let model  = ckpt.load_model(model, &device)?;
        tracing::info!(
            "Model loaded: {:?}, {} latents x {}, {}px",
            opts.mapper_type,
            opts.n_latents(),
            opts.latent_dim,
            opts.stylegan_size
        );
        Ok(Self::new(model, device))
    }

    /// Edit and decode one batch. Burn inference backends carry no
    /// autodiff graph, so nothing here records gradients.
    pub fn run_on_batch(&self, batch: LatentBatch<B>, couple_outputs: bool) -> EditOutput<B> {
        let latents    = batch.latents.to_device(&self.device);
        let transforms = batch.transforms.map(|t| t.to_device(&self.device));
        self.model.forward(latents, transforms, couple_outputs)
    }
}

impl HostBatch {
    /// Copy a batch of outputs off the device and split it per sample.
    pub fn from_output<B: Backend>(output: EditOutput<B>) -> Result<Self> {
        let [_, c, h, w]  = output.x_hat.dims();
        let [_, n, d]     = output.w_hat.dims();

        let images  = split_rows(output.x_hat, c * h * w)?;
        let latents = split_rows(output.w_hat, n * d)?;
        let recons  = output.x.map(|x| split_rows(x, c * h * w)).transpose()?;

        Ok(Self {
            images,
            recons,
            latents,
            image_chw:    [c, h, w],
            latent_shape: [n, d],
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}

/// Flatten a batch tensor and cut it into per-sample rows.
fn split_rows<B: Backend, const D: usize>(t: Tensor<B, D>, row_len: usize) -> Result<Vec<Vec<f32>>> {
    let values = t
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))?;
    Ok(values.chunks(row_len.max(1)).map(|r| r.to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::LatentBatcher;
    use crate::domain::latent::LatentSample;
    use crate::domain::options::MapperType;
    use crate::ml::synthesis::SynthesisConfig;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray;

    fn inferencer() -> Inferencer<TestBackend> {
        let config = StyleClipMapperConfig {
            mapper_type: MapperType::LevelsMapper,
            coarse:      true,
            medium:      true,
            fine:        true,
            synthesis:   SynthesisConfig::new(8, 4, 4, 4, 8, 16.0, 2.0),
        };
        let device = Default::default();
        Inferencer::new(config.init(&device), device)
    }

    fn batch(n: usize) -> LatentBatch<TestBackend> {
        let items = (0..n)
            .map(|index| LatentSample { index, code: vec![0.1; 32], transform: None })
            .collect();
        LatentBatcher::new(4, 8).batch(items, &Default::default())
    }

    #[test]
    fn test_host_batch_splits_per_sample() {
        let inf  = inferencer();
        let out  = inf.run_on_batch(batch(3), false);
        let host = HostBatch::from_output(out).unwrap();

        assert_eq!(host.len(), 3);
        assert_eq!(host.image_chw, [3, 8, 8]);
        assert_eq!(host.latent_shape, [4, 8]);
        assert_eq!(host.images[2].len(), 3 * 8 * 8);
        assert_eq!(host.latents[0].len(), 32);
        assert!(host.recons.is_none());
    }

    #[test]
    fn test_host_batch_keeps_reconstructions() {
        let inf  = inferencer();
        let host = HostBatch::from_output(inf.run_on_batch(batch(2), true)).unwrap();
        let recons = host.recons.expect("coupled outputs");
        assert_eq!(recons.len(), 2);
        assert_eq!(recons[1].len(), 3 * 8 * 8);
    }
}
