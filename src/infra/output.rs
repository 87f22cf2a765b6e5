// ============================================================
// Layer 6 — Output Writer
// ============================================================
// Writes the per-sample artifacts of a run:
//
//   <exp_dir>/inference_results/
//     00000.jpg          ← edited image (or reconstruction | edit)
//     latent_00000.npy   ← edited latent, f32 [n_latents, latent_dim]
//     00001.jpg
//     latent_00001.npy
//     ...
//
// Image conversion:
//   generator range [-1, 1] → clamp → [0, 1] → ×255 + 0.5 → u8
//
// Coupled outputs are laid out as a one-row grid with 2px of
// black padding around and between the tiles:
//
//   ┌──────────────────────────┐
//   │ ┌────────┐  ┌────────┐   │
//   │ │ recon  │  │  edit  │   │
//   │ └────────┘  └────────┘   │
//   └──────────────────────────┘
//
// Reference: image crate documentation (RgbImage)
//            ndarray-npy crate documentation

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ndarray::{ArrayD, IxDyn};
use ndarray_npy::WriteNpyExt;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

use crate::domain::traits::ArtifactSink;

pub const RESULTS_DIR: &str = "inference_results";

/// Padding between grid tiles, in pixels
const GRID_PADDING: usize = 2;
/// Tiles per grid row before wrapping
const GRID_NROW: usize = 8;

/// `00042` style zero-padded name stem.
pub fn sample_stem(index: usize) -> String {
    format!("{index:05}")
}

/// Map one generator value in [-1, 1] to a display byte.
pub fn to_display_byte(v: f32) -> u8 {
    let unit = ((v.clamp(-1.0, 1.0) + 1.0) / 2.0).clamp(0.0, 1.0);
    (unit * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}

/// Lay CHW tiles out as an RGB grid. Returns (width, height, HWC bytes).
pub fn compose_grid(tiles: &[&[f32]], chw: [usize; 3]) -> Result<(u32, u32, Vec<u8>)> {
    let [c, h, w] = chw;
    if c != 3 {
        bail!("Expected 3-channel images, got {c}");
    }
    if tiles.is_empty() {
        bail!("No image to write");
    }
    if let Some(bad) = tiles.iter().find(|t| t.len() != c * h * w) {
        bail!("Image has {} values, expected {} for {:?}", bad.len(), c * h * w, chw);
    }

    // A single image is written as-is, without padding
    let (pad, cols, rows) = if tiles.len() == 1 {
        (0, 1, 1)
    } else {
        let cols = tiles.len().min(GRID_NROW);
        (GRID_PADDING, cols, tiles.len().div_ceil(cols))
    };

    let cell_w = w + pad;
    let cell_h = h + pad;
    let width  = cols * cell_w + pad;
    let height = rows * cell_h + pad;
    let mut buf = vec![0u8; width * height * 3];

    for (k, tile) in tiles.iter().enumerate() {
        let x0 = (k % cols) * cell_w + pad;
        let y0 = (k / cols) * cell_h + pad;
        for ch in 0..c {
            for y in 0..h {
                for x in 0..w {
                    let v   = tile[ch * h * w + y * w + x];
                    let dst = ((y0 + y) * width + (x0 + x)) * 3 + ch;
                    buf[dst] = to_display_byte(v);
                }
            }
        }
    }

    Ok((width as u32, height as u32, buf))
}

/// Writes images and latents into `<exp_dir>/inference_results`.
/// Implements the ArtifactSink trait from Layer 3.
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    /// Create the results directory if it doesn't exist yet.
    pub fn new(exp_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = exp_dir.as_ref().join(RESULTS_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create results dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.jpg", sample_stem(index)))
    }

    pub fn latent_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("latent_{}.npy", sample_stem(index)))
    }

    fn save_image(&self, index: usize, tiles: &[&[f32]], chw: [usize; 3]) -> Result<()> {
        let (width, height, buf) = compose_grid(tiles, chw)?;
        let img = RgbImage::from_raw(width, height, buf)
            .context("Image buffer does not match its dimensions")?;

        let path = self.image_path(index);
        img.save(&path)
            .with_context(|| format!("Cannot write image '{}'", path.display()))
    }

    fn save_latent(&self, index: usize, latent: &[f32], shape: &[usize]) -> Result<()> {
        let arr = ArrayD::from_shape_vec(IxDyn(shape), latent.to_vec())
            .with_context(|| format!("Latent does not fit shape {shape:?}"))?;

        let path = self.latent_path(index);
        let file = File::create(&path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        arr.write_npy(BufWriter::new(file))
            .with_context(|| format!("Cannot write latent '{}'", path.display()))
    }
}

impl ArtifactSink for OutputWriter {
    fn write_sample(
        &self,
        name_index:   usize,
        tiles:        &[&[f32]],
        image_chw:    [usize; 3],
        latent:       &[f32],
        latent_shape: &[usize],
    ) -> Result<()> {
        self.save_image(name_index, tiles, image_chw)?;
        self.save_latent(name_index, latent, latent_shape)?;
        tracing::trace!("Wrote sample {}", sample_stem(name_index));
        Ok(())
    }
}
