// ============================================================
// Layer 2 — InferUseCase
// ============================================================
// Orchestrates one inference run in order:
//
//   Step 1: Read stored options         (Layer 6 - infra)
//   Step 2: Merge with test options     (Layer 3 - domain)
//   Step 3: Create inference_results/   (Layer 6 - infra)
//   Step 4: Load latents + transforms   (Layer 4 - data)
//   Step 5: Build model, load weights   (Layer 5 - ml)
//   Step 6: Batch loop: edit, decode,   (Layer 5 - ml)
//           write every sample          (Layer 6 - infra)
//   Step 7: Write stats.txt             (Layer 6 - infra)
//
// The cap on images is checked once per batch, before the
// batch is processed, so a run can produce up to
// batch_size − 1 images more than n_images.
//
// Reference: Burn Book §4 (DataLoader)

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, NdArray, Wgpu},
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    prelude::*,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use crate::application::ComputeDevice;
use crate::data::{batcher::LatentBatcher, dataset::LatentsDataset, loader::NpyLatentLoader};
use crate::domain::options::{merge_options, InferenceOptions, TestOptions};
use crate::domain::traits::{ArtifactSink, LatentSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{RuntimeStats, StatsWriter},
    output::OutputWriter,
};
use crate::ml::inferencer::{HostBatch, Inferencer};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub samples_written: usize,
    pub batches:         usize,
    pub stats_line:      String,
}

// ─── InferUseCase ─────────────────────────────────────────────────────────────
pub struct InferUseCase {
    test_opts: TestOptions,
    device:    ComputeDevice,
}

impl InferUseCase {
    pub fn new(test_opts: TestOptions, device: ComputeDevice) -> Self {
        Self { test_opts, device }
    }

    /// Resolve the options and run on the selected backend.
    pub fn execute(&self) -> Result<RunSummary> {
        // ── Steps 1–2: stored options, overridden by this run's ───────────────
        let ckpt   = CheckpointManager::new(&self.test_opts.checkpoint_path);
        let stored = ckpt.load_options()?;
        let merged = merge_options(&stored, self.test_opts.to_overrides()?);
        let opts   = InferenceOptions::from_bag(merged)?;
        tracing::debug!("Resolved options: {:?}", opts);

        match self.device {
            ComputeDevice::Wgpu => run::<Wgpu>(&opts, &ckpt, WgpuDevice::default()),
            ComputeDevice::Cpu  => run::<NdArray>(&opts, &ckpt, Default::default()),
        }
    }
}

/// The inference loop on backend `B`.
pub fn run<B: Backend>(
    opts:   &InferenceOptions,
    ckpt:   &CheckpointManager,
    device: B::Device,
) -> Result<RunSummary> {
    // ── Step 3: output directory ──────────────────────────────────────────────
    let writer = OutputWriter::new(&opts.exp_dir)?;

    // ── Step 4: latents, checked against the architecture ─────────────────────
    let loader = NpyLatentLoader::new(
        opts.latents_test_path.clone(),
        opts.transforms_path().map(str::to_string),
    );
    let latents = loader.load()?;
    latents.expect_shape(opts.n_latents(), opts.latent_dim)?;
    if latents.is_empty() {
        tracing::warn!("No latents in '{}'", opts.latents_test_path);
    }
    if latents.has_transforms() {
        tracing::info!("Per-sample transforms from '{}'", opts.transforms_path().unwrap_or_default());
    }

    // ── Step 5: model ─────────────────────────────────────────────────────────
    let inferencer = Inferencer::<B>::from_checkpoint(ckpt, opts, device.clone())?;

    let n_images = opts.n_images.unwrap_or(latents.len());
    let dataset  = LatentsDataset::new(latents).into_full_batches(opts.test_batch_size);
    let batches  = dataset.len() / opts.test_batch_size;
    tracing::info!(
        "{} full batches of {} (cap {} images, test_workers {})",
        batches,
        opts.test_batch_size,
        n_images,
        opts.test_workers
    );

    // Loaded on this thread so every batch is full and in file order
    let batcher    = LatentBatcher::new(opts.n_latents(), opts.latent_dim);
    let dataloader = DataLoaderBuilder::<B, _, _>::new(batcher)
        .batch_size(opts.test_batch_size)
        .set_device(device)
        .build(dataset);

    let progress = ProgressBar::new(batches as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} batches [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // ── Step 6: batch loop ────────────────────────────────────────────────────
    let mut global_i = 0usize;
    let mut stats    = RuntimeStats::new();

    for batch in dataloader.iter() {
        if global_i >= n_images {
            break;
        }

        let indices = batch.indices.clone();

        // Timed through the host copy, which is where the device syncs
        let tic    = Instant::now();
        let output = inferencer.run_on_batch(batch, opts.couple_outputs);
        let host   = HostBatch::from_output(output)?;
        stats.record(tic.elapsed());

        write_batch(&writer, &host, &indices)?;
        global_i += host.len();
        progress.inc(1);
    }
    progress.finish_and_clear();

    // ── Step 7: stats ─────────────────────────────────────────────────────────
    let stats_line = StatsWriter::new(&opts.exp_dir).write(&stats)?;
    println!("{stats_line}");

    tracing::info!(
        "Wrote {} samples to '{}'",
        global_i,
        writer.dir().display()
    );

    Ok(RunSummary {
        samples_written: global_i,
        batches:         stats.batches(),
        stats_line,
    })
}

/// Write every sample of a batch, named by its row in the latent file.
fn write_batch(sink: &impl ArtifactSink, host: &HostBatch, indices: &[usize]) -> Result<()> {
    for (i, &index) in indices.iter().enumerate().take(host.len()) {
        let image = host.images[i].as_slice();
        let tiles: Vec<&[f32]> = match &host.recons {
            // reconstruction first, edit second
            Some(recons) => vec![recons[i].as_slice(), image],
            None         => vec![image],
        };
        sink.write_sample(index, &tiles, host.image_chw, &host.latents[i], &host.latent_shape)?;
    }
    Ok(())
}
