// ============================================================
// Layer 5 — StyleClipMapper
// ============================================================
// The latent mapper and the generator it edits for:
//
//   w ──► LatentMapper ──► × 0.1 ──► + w ──► w_hat ──► Synthesis ──► x_hat
//   │                                                      ▲
//   └──────────────── (coupled outputs) ───────────────────┴──► x
//
// Reference: Patashnik et al. (2021) StyleCLIP

use burn::prelude::*;

use crate::domain::options::{InferenceOptions, MapperType};
use crate::ml::mapper::LatentMapper;
use crate::ml::synthesis::{SynthesisConfig, SynthesisNetwork};

/// Scale of the mapper step in the edit rule `w + EDIT_STEP · mapper(w)`.
pub const EDIT_STEP: f64 = 0.1;

/// Architecture of a mapper checkpoint, read from the option bag.
#[derive(Config, Debug)]
pub struct StyleClipMapperConfig {
    pub mapper_type: MapperType,
    pub coarse:      bool,
    pub medium:      bool,
    pub fine:        bool,
    pub synthesis:   SynthesisConfig,
}

impl StyleClipMapperConfig {
    pub fn from_options(opts: &InferenceOptions) -> Self {
        Self {
            mapper_type: opts.mapper_type,
            coarse:      !opts.no_coarse_mapper,
            medium:      !opts.no_medium_mapper,
            fine:        !opts.no_fine_mapper,
            synthesis: SynthesisConfig::new(
                opts.latent_dim,
                opts.n_latents(),
                opts.synthesis_channels,
                opts.synthesis_input_size,
                opts.stylegan_size,
                opts.sampling_rate,
                opts.bandwidth,
            ),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> StyleClipMapper<B> {
        let latent_mapper = LatentMapper::new(
            self.mapper_type,
            self.synthesis.w_dim,
            self.coarse,
            self.medium,
            self.fine,
            device,
        );
        let decoder = self.synthesis.init(device);
        StyleClipMapper { latent_mapper, decoder }
    }
}

/// Mapper plus the generator it edits for.
#[derive(Module, Debug)]
pub struct StyleClipMapper<B: Backend> {
    pub latent_mapper: LatentMapper<B>,
    pub decoder:       SynthesisNetwork<B>,
}

/// Outputs of one batch.
pub struct EditOutput<B: Backend> {
    /// Edited image — [batch, 3, R, R]
    pub x_hat: Tensor<B, 4>,
    /// Edited latent — [batch, n_latents, latent_dim]
    pub w_hat: Tensor<B, 3>,
    /// Reconstruction of the unedited latent, for coupled outputs
    pub x:     Option<Tensor<B, 4>>,
}

impl<B: Backend> StyleClipMapper<B> {
    /// Apply the edit rule and decode.
    ///
    /// The same transform (identity when None) drives both the
    /// edited decode and the optional reconstruction.
    pub fn forward(
        &self,
        w:              Tensor<B, 3>,
        transform:      Option<Tensor<B, 3>>,
        couple_outputs: bool,
    ) -> EditOutput<B> {
        let w_hat = w.clone() + self.latent_mapper.forward(w.clone()).mul_scalar(EDIT_STEP);
        let x_hat = self.decoder.forward(w_hat.clone(), transform.clone());
        let x     = couple_outputs.then(|| self.decoder.forward(w, transform));
        EditOutput { x_hat, w_hat, x }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn tiny_config(mapper_type: MapperType, coarse: bool, medium: bool, fine: bool) -> StyleClipMapperConfig {
        StyleClipMapperConfig {
            mapper_type,
            coarse,
            medium,
            fine,
            synthesis: SynthesisConfig::new(8, 4, 4, 4, 8, 16.0, 2.0),
        }
    }

    #[test]
    fn test_edit_is_identity_when_all_levels_disabled() {
        let device = Default::default();
        let net: StyleClipMapper<TestBackend> =
            tiny_config(MapperType::LevelsMapper, false, false, false).init(&device);
        let w = Tensor::<TestBackend, 3>::random([2, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        let out  = net.forward(w.clone(), None, false);
        let diff: f32 = (out.w_hat - w).abs().max().into_scalar();
        assert_eq!(diff, 0.0);
        assert!(out.x.is_none());
    }

    #[test]
    fn test_edit_rule_step_scale() {
        let device = Default::default();
        let net: StyleClipMapper<TestBackend> =
            tiny_config(MapperType::SingleMapper, true, true, true).init(&device);
        let w = Tensor::<TestBackend, 3>::random([1, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        let direction = net.latent_mapper.forward(w.clone());
        let expected  = w.clone() + direction.mul_scalar(0.1);
        let out       = net.forward(w, None, false);
        let diff: f32 = (out.w_hat - expected).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_couple_outputs_decodes_unedited_latent() {
        let device = Default::default();
        let net: StyleClipMapper<TestBackend> =
            tiny_config(MapperType::LevelsMapper, true, true, true).init(&device);
        let w = Tensor::<TestBackend, 3>::random([2, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        let recon = net.decoder.forward(w.clone(), None);
        let out   = net.forward(w, None, true);
        let x     = out.x.expect("reconstruction requested");
        assert_eq!(x.dims(), [2, 3, 8, 8]);
        let diff: f32 = (x - recon).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }
}
