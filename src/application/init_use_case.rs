// ============================================================
// Layer 2 — InitUseCase
// ============================================================
// Writes a fresh, randomly initialised checkpoint:
//
//   Step 1: Build the option bag        (Layer 3 - domain)
//   Step 2: Check it reads as options   (Layer 3 - domain)
//   Step 3: Build the model             (Layer 5 - ml)
//   Step 4: Save opts.json + weights    (Layer 6 - infra)
//
// The result has exactly the layout `infer` reads, so a run
// can be smoke-tested without a trained mapper.

use anyhow::{bail, Result};
use burn::{
    backend::{wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ComputeDevice;
use crate::domain::options::{InferenceOptions, MapperType, OptionBag};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::StyleClipMapperConfig;

// ─── Init Configuration ──────────────────────────────────────────────────────
// Everything stored in opts.json. The field names are the option
// keys `infer` merges its own options over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub checkpoint_path:      String,
    pub exp_dir:              String,
    pub latents_test_path:    String,
    pub mapper_type:          MapperType,
    pub no_coarse_mapper:     bool,
    pub no_medium_mapper:     bool,
    pub no_fine_mapper:       bool,
    pub stylegan_size:        usize,
    pub latent_dim:           usize,
    pub synthesis_channels:   usize,
    pub synthesis_input_size: usize,
    pub sampling_rate:        f64,
    pub bandwidth:            f64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            checkpoint_path:      "checkpoints/mapper".to_string(),
            exp_dir:              "results".to_string(),
            latents_test_path:    "latents_test/example_celebs.npy".to_string(),
            mapper_type:          MapperType::LevelsMapper,
            no_coarse_mapper:     false,
            no_medium_mapper:     false,
            no_fine_mapper:       false,
            stylegan_size:        1024,
            latent_dim:           512,
            synthesis_channels:   64,
            synthesis_input_size: 16,
            sampling_rate:        16.0,
            bandwidth:            2.0,
        }
    }
}

impl InitConfig {
    pub fn new(checkpoint_path: impl Into<String>) -> Self {
        Self { checkpoint_path: checkpoint_path.into(), ..Self::default() }
    }

    /// The bag written to opts.json.
    pub fn to_bag(&self) -> Result<OptionBag> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => bail!("Init config serialised to a non-object: {other}"),
        }
    }
}

// ─── InitUseCase ──────────────────────────────────────────────────────────────
pub struct InitUseCase {
    config: InitConfig,
    device: ComputeDevice,
}

impl InitUseCase {
    pub fn new(config: InitConfig, device: ComputeDevice) -> Self {
        Self { config, device }
    }

    pub fn execute(&self) -> Result<()> {
        // ── Steps 1–2 ─────────────────────────────────────────────────────────
        let bag  = self.config.to_bag()?;
        let opts = InferenceOptions::from_bag(bag.clone())?;

        let ckpt = CheckpointManager::new(&self.config.checkpoint_path);
        match self.device {
            ComputeDevice::Wgpu => save_fresh::<Wgpu>(&ckpt, &bag, &opts, &WgpuDevice::default())?,
            ComputeDevice::Cpu  => save_fresh::<NdArray>(&ckpt, &bag, &opts, &Default::default())?,
        }

        tracing::info!(
            "Initialised {:?} checkpoint at '{}' ({} latents x {}, {}px)",
            opts.mapper_type,
            ckpt.dir().display(),
            opts.n_latents(),
            opts.latent_dim,
            opts.stylegan_size
        );
        Ok(())
    }
}

// ── Steps 3–4 ─────────────────────────────────────────────────────────────────
fn save_fresh<B: Backend>(
    ckpt:   &CheckpointManager,
    bag:    &OptionBag,
    opts:   &InferenceOptions,
    device: &B::Device,
) -> Result<()> {
    let model = StyleClipMapperConfig::from_options(opts).init::<B>(device);
    ckpt.save_model(&model)?;
    ckpt.save_options(bag)
}
