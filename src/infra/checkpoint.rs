// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores a mapper checkpoint.
//
// What a checkpoint holds:
//   1. Model weights (model.mpk) — mapper + synthesis network,
//      written by Burn's NamedMpkFileRecorder at full precision
//   2. opts.json                 — the option bag the model was
//                                  built from (architecture and
//                                  training-time paths)
//
// Loading needs the options first: they tell us how to build
// the empty model the weights are then loaded into.
//
// File layout:
//   <checkpoint_path>/
//     opts.json
//     model.mpk
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde_json::Value;
use std::{fs, path::PathBuf};

use crate::domain::options::OptionBag;
use crate::ml::model::StyleClipMapper;

const OPTIONS_FILE: &str = "opts.json";
const MODEL_FILE: &str = "model";

type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Reads and writes a checkpoint directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Save model weights. The recorder adds the `.mpk` extension.
    pub fn save_model<B: Backend>(&self, model: &StyleClipMapper<B>) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))?;

        let path = self.dir.join(MODEL_FILE);
        CheckpointRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;

        tracing::debug!("Saved weights to '{}.mpk'", path.display());
        Ok(())
    }

    /// Load weights into a model built with the matching architecture.
    pub fn load_model<B: Backend>(
        &self,
        model:  StyleClipMapper<B>,
        device: &B::Device,
    ) -> Result<StyleClipMapper<B>> {
        let path = self.dir.join(MODEL_FILE);
        tracing::info!("Loading weights from '{}.mpk'", path.display());

        let record = CheckpointRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load weights '{}.mpk' (missing file or architecture mismatch)",
                    path.display()
                )
            })?;

        Ok(model.load_record(record))
    }

    /// Write the option bag as pretty JSON.
    pub fn save_options(&self, opts: &OptionBag) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", self.dir.display()))?;

        let path = self.dir.join(OPTIONS_FILE);
        let json = serde_json::to_string_pretty(opts)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write options to '{}'", path.display()))?;

        tracing::debug!("Saved options to '{}'", path.display());
        Ok(())
    }

    /// Read the stored option bag.
    pub fn load_options(&self) -> Result<OptionBag> {
        let path = self.dir.join(OPTIONS_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read checkpoint options '{}'", path.display())
        })?;

        match serde_json::from_str::<Value>(&json)
            .with_context(|| format!("Corrupt checkpoint options '{}'", path.display()))?
        {
            Value::Object(map) => Ok(map),
            other => bail!(
                "Checkpoint options '{}' must be a JSON object, found {}",
                path.display(),
                json_kind(&other)
            ),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::options::MapperType;
    use crate::ml::model::StyleClipMapperConfig;
    use crate::ml::synthesis::SynthesisConfig;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use serde_json::json;

    type TestBackend = NdArray;

    fn tiny_config() -> StyleClipMapperConfig {
        StyleClipMapperConfig {
            mapper_type: MapperType::LevelsMapper,
            coarse:      true,
            medium:      false,
            fine:        true,
            synthesis:   SynthesisConfig::new(8, 4, 4, 4, 8, 16.0, 2.0),
        }
    }

    #[test]
    fn test_options_roundtrip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("ckpt"));
        let bag  = json!({ "latent_dim": 8, "stylegan_size": 8 }).as_object().cloned().unwrap();

        ckpt.save_options(&bag).unwrap();
        assert_eq!(ckpt.load_options().unwrap(), bag);
    }

    #[test]
    fn test_non_object_options_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OPTIONS_FILE), "[1, 2]").unwrap();
        let err = CheckpointManager::new(dir.path()).load_options().unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nothing"));
        assert!(ckpt.load_options().is_err());

        let device = Default::default();
        let model: StyleClipMapper<TestBackend> = tiny_config().init(&device);
        assert!(ckpt.load_model(model, &device).is_err());
    }

    #[test]
    fn test_weights_roundtrip() {
        let dir    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path());
        let device = Default::default();

        let saved: StyleClipMapper<TestBackend> = tiny_config().init(&device);
        ckpt.save_model(&saved).unwrap();

        // A fresh model has different random weights until loaded
        let fresh: StyleClipMapper<TestBackend> = tiny_config().init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let w = Tensor::<TestBackend, 3>::random([1, 4, 8], Distribution::Normal(0.0, 1.0), &device);
        let a = saved.forward(w.clone(), None, false).x_hat;
        let b = loaded.forward(w, None, false).x_hat;
        let diff: f32 = (a - b).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }
}
