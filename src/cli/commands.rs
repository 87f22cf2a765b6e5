// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `infer` and `init`, and all
// their flags.
//
// The `infer` flags are the test options: each one overrides
// the training option of the same name stored in the
// checkpoint's opts.json.
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use crate::application::{init_use_case::InitConfig, ComputeDevice};
use crate::domain::options::{MapperType, TestOptions};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit a file of latent codes with a trained mapper
    Infer(InferArgs),

    /// Write a freshly initialised mapper checkpoint
    Init(InitArgs),
}

/// Compute backend for a command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    Cpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Wgpu => ComputeDevice::Wgpu,
            DeviceArg::Cpu  => ComputeDevice::Cpu,
        }
    }
}

/// All arguments for the `infer` command.
#[derive(Args, Debug)]
pub struct InferArgs {
    /// Experiment directory; results and stats.txt go here
    #[arg(long)]
    pub exp_dir: String,

    /// Checkpoint directory holding opts.json and model.mpk
    #[arg(long)]
    pub checkpoint_path: String,

    /// Write the unedited reconstruction next to each edit
    #[arg(long)]
    pub couple_outputs: bool,

    /// Mapper layout: SingleMapper or LevelsMapper
    #[arg(long, default_value = "LevelsMapper")]
    pub mapper_type: String,

    /// Leave the coarse latents (0–3) unedited
    #[arg(long)]
    pub no_coarse_mapper: bool,

    /// Leave the medium latents (4–7) unedited
    #[arg(long)]
    pub no_medium_mapper: bool,

    /// Leave the fine latents (8+) unedited
    #[arg(long)]
    pub no_fine_mapper: bool,

    /// Generator output resolution
    #[arg(long, default_value_t = 1024)]
    pub stylegan_size: usize,

    /// Latents per batch; a trailing partial batch is dropped
    #[arg(long, default_value_t = 2)]
    pub test_batch_size: usize,

    /// .npy file of latent codes, shape [N, n_latents, latent_dim]
    #[arg(long, default_value = "latents_test/example_celebs.npy")]
    pub latents_test_path: String,

    /// Stored with the run options; batches always load in file order
    /// on the calling thread, whatever the value
    #[arg(long, default_value_t = 2)]
    pub test_workers: usize,

    /// Stop once this many images have been written (checked per batch)
    #[arg(long)]
    pub n_images: Option<usize>,

    /// .npy file of per-sample 3x3 input transforms, shape [N, 3, 3]
    #[arg(long)]
    pub fourier_features_transforms_path: Option<String>,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

impl InferArgs {
    /// Convert into the application-layer test options.
    pub fn to_test_options(&self) -> Result<TestOptions> {
        Ok(TestOptions {
            exp_dir:           self.exp_dir.clone(),
            checkpoint_path:   self.checkpoint_path.clone(),
            couple_outputs:    self.couple_outputs,
            mapper_type:       MapperType::parse(&self.mapper_type)?,
            no_coarse_mapper:  self.no_coarse_mapper,
            no_medium_mapper:  self.no_medium_mapper,
            no_fine_mapper:    self.no_fine_mapper,
            stylegan_size:     self.stylegan_size,
            test_batch_size:   self.test_batch_size,
            latents_test_path: self.latents_test_path.clone(),
            test_workers:      self.test_workers,
            n_images:          self.n_images,
            fourier_features_transforms_path: self.fourier_features_transforms_path.clone(),
        })
    }
}

/// All arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write opts.json and model.mpk into
    #[arg(long)]
    pub checkpoint_path: String,

    /// Experiment directory recorded in opts.json
    #[arg(long, default_value = "results")]
    pub exp_dir: String,

    /// Latent file recorded in opts.json
    #[arg(long, default_value = "latents_test/example_celebs.npy")]
    pub latents_test_path: String,

    /// Mapper layout: SingleMapper or LevelsMapper
    #[arg(long, default_value = "LevelsMapper")]
    pub mapper_type: String,

    #[arg(long)]
    pub no_coarse_mapper: bool,

    #[arg(long)]
    pub no_medium_mapper: bool,

    #[arg(long)]
    pub no_fine_mapper: bool,

    /// Generator output resolution (power of two)
    #[arg(long, default_value_t = 1024)]
    pub stylegan_size: usize,

    /// Width of one latent code
    #[arg(long, default_value_t = 512)]
    pub latent_dim: usize,

    /// Feature channels in every synthesis layer
    #[arg(long, default_value_t = 64)]
    pub synthesis_channels: usize,

    /// Side of the Fourier-feature input grid
    #[arg(long, default_value_t = 16)]
    pub synthesis_input_size: usize,

    /// Sampling rate of the input grid
    #[arg(long, default_value_t = 16.0)]
    pub sampling_rate: f64,

    /// Frequency bandwidth of the Fourier features
    #[arg(long, default_value_t = 2.0)]
    pub bandwidth: f64,

    #[arg(long, value_enum, default_value_t = DeviceArg::Wgpu)]
    pub device: DeviceArg,
}

impl InitArgs {
    pub fn to_config(&self) -> Result<InitConfig> {
        Ok(InitConfig {
            checkpoint_path:      self.checkpoint_path.clone(),
            exp_dir:              self.exp_dir.clone(),
            latents_test_path:    self.latents_test_path.clone(),
            mapper_type:          MapperType::parse(&self.mapper_type)?,
            no_coarse_mapper:     self.no_coarse_mapper,
            no_medium_mapper:     self.no_medium_mapper,
            no_fine_mapper:       self.no_fine_mapper,
            stylegan_size:        self.stylegan_size,
            latent_dim:           self.latent_dim,
            synthesis_channels:   self.synthesis_channels,
            synthesis_input_size: self.synthesis_input_size,
            sampling_rate:        self.sampling_rate,
            bandwidth:            self.bandwidth,
        })
    }
}
