// ============================================================
// Layer 3 — Run Options
// ============================================================
// Two option sets meet at inference time:
//
//   1. The option bag stored in the checkpoint (opts.json),
//      written when the mapper was trained. It carries the
//      model architecture and whatever else training knew.
//   2. The test options given on the command line for this run.
//
// merge_options() folds them into one JSON object where the
// test options win on every shared key. The merged object is
// then read into the typed InferenceOptions view.
//
// Example:
//   stored:    { "test_batch_size": 8, "latent_dim": 512 }
//   overrides: { "test_batch_size": 2 }
//   merged:    { "test_batch_size": 2, "latent_dim": 512 }
//
// Reference: serde_json documentation (Map, Value)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The option bag as stored on disk — an untyped JSON object.
pub type OptionBag = Map<String, Value>;

/// Fold `overrides` into `stored`. Keys present in both take the
/// override value, including an explicit `null`.
pub fn merge_options(stored: &OptionBag, overrides: OptionBag) -> OptionBag {
    let mut merged = stored.clone();
    for (key, value) in overrides {
        merged.insert(key, value);
    }
    merged
}

// ─── MapperType ───────────────────────────────────────────────────────────────
/// Which mapper layout the checkpoint was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperType {
    /// One mapper over every latent
    SingleMapper,
    /// Separate coarse / medium / fine mappers
    LevelsMapper,
}

impl MapperType {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "SingleMapper" => Ok(Self::SingleMapper),
            "LevelsMapper" => Ok(Self::LevelsMapper),
            other => bail!("Unknown mapper type '{other}' (expected SingleMapper or LevelsMapper)"),
        }
    }
}

// ─── TestOptions ──────────────────────────────────────────────────────────────
/// Options supplied for this inference run.
///
/// Every field here overrides the stored training option of the
/// same name. Unset optional fields serialise as `null` and clear
/// the stored value.
#[derive(Debug, Clone, Serialize)]
pub struct TestOptions {
    pub exp_dir:           String,
    pub checkpoint_path:   String,
    pub couple_outputs:    bool,
    pub mapper_type:       MapperType,
    pub no_coarse_mapper:  bool,
    pub no_medium_mapper:  bool,
    pub no_fine_mapper:    bool,
    pub stylegan_size:     usize,
    pub test_batch_size:   usize,
    pub latents_test_path: String,
    pub test_workers:      usize,
    pub n_images:          Option<usize>,
    pub fourier_features_transforms_path: Option<String>,
}

impl TestOptions {
    /// Serialise into the override bag used by `merge_options`.
    pub fn to_overrides(&self) -> Result<OptionBag> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => bail!("Test options serialised to a non-object: {other}"),
        }
    }
}

// ─── InferenceOptions ─────────────────────────────────────────────────────────
/// Typed view over the merged option bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOptions {
    pub exp_dir:           String,
    pub checkpoint_path:   String,
    pub latents_test_path: String,

    #[serde(default)]
    pub couple_outputs: bool,

    #[serde(default = "default_mapper_type")]
    pub mapper_type: MapperType,

    #[serde(default)]
    pub no_coarse_mapper: bool,
    #[serde(default)]
    pub no_medium_mapper: bool,
    #[serde(default)]
    pub no_fine_mapper:   bool,

    #[serde(default = "default_stylegan_size")]
    pub stylegan_size: usize,

    #[serde(default = "default_test_batch_size")]
    pub test_batch_size: usize,

    #[serde(default = "default_test_workers")]
    pub test_workers: usize,

    #[serde(default)]
    pub n_images: Option<usize>,

    #[serde(default)]
    pub fourier_features_transforms_path: Option<String>,

    // ── Architecture (written at training time) ──────────────────────────────
    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    #[serde(default = "default_synthesis_channels")]
    pub synthesis_channels: usize,

    #[serde(default = "default_synthesis_input_size")]
    pub synthesis_input_size: usize,

    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    #[serde(default = "default_bandwidth")]
    pub bandwidth: f64,
}

fn default_mapper_type() -> MapperType { MapperType::LevelsMapper }
fn default_stylegan_size() -> usize { 1024 }
fn default_test_batch_size() -> usize { 2 }
fn default_test_workers() -> usize { 2 }
fn default_latent_dim() -> usize { 512 }
fn default_synthesis_channels() -> usize { 64 }
fn default_synthesis_input_size() -> usize { 16 }
fn default_sampling_rate() -> f64 { 16.0 }
fn default_bandwidth() -> f64 { 2.0 }

impl InferenceOptions {
    /// Read the typed view out of a merged bag and check it.
    pub fn from_bag(bag: OptionBag) -> Result<Self> {
        let opts: Self = serde_json::from_value(Value::Object(bag))
            .context("Merged options are missing required fields or have the wrong types")?;
        opts.validate()?;
        Ok(opts)
    }

    /// Number of per-layer latents the generator consumes
    /// (18 for a 1024px generator, 16 for 512px).
    pub fn n_latents(&self) -> usize {
        n_latents_for_size(self.stylegan_size)
    }

    /// The transform file path, treating an empty string as unset.
    pub fn transforms_path(&self) -> Option<&str> {
        self.fourier_features_transforms_path
            .as_deref()
            .filter(|p| !p.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.test_batch_size == 0 {
            bail!("test_batch_size must be at least 1");
        }
        if !self.stylegan_size.is_power_of_two() || self.stylegan_size < 4 {
            bail!("stylegan_size must be a power of two >= 4, got {}", self.stylegan_size);
        }
        if !self.synthesis_input_size.is_power_of_two()
            || self.synthesis_input_size > self.stylegan_size
        {
            bail!(
                "synthesis_input_size must be a power of two <= stylegan_size ({}), got {}",
                self.stylegan_size,
                self.synthesis_input_size
            );
        }
        if self.latent_dim == 0 || self.synthesis_channels == 0 {
            bail!("latent_dim and synthesis_channels must be non-zero");
        }
        Ok(())
    }
}

/// 2·log2(size) − 2 latents for a generator of the given resolution.
pub fn n_latents_for_size(stylegan_size: usize) -> usize {
    2 * stylegan_size.trailing_zeros() as usize - 2
}
