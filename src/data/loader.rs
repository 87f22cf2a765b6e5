// ============================================================
// Layer 4 — Latent Loader
// ============================================================
// Loads precomputed latent codes (and optional per-sample
// transforms) from NumPy `.npy` files using ndarray-npy.
//
// Expected files:
//   latents:    f32, shape [N, n_latents, latent_dim]
//   transforms: f32 or f64, shape [N, 3, 3]   (optional)
//
// The first axis is the sample axis; every remaining axis is
// kept as the per-sample shape and the data is flattened
// row-major into LatentSample::code.
//
// Reference: ndarray-npy crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use ndarray::{ArrayD, Axis};
use ndarray_npy::ReadNpyExt;
use std::{fs::File, path::Path};

use crate::domain::latent::{LatentSample, LatentSet, Transform};
use crate::domain::traits::LatentSource;

/// Reads latents and transforms from `.npy` files.
/// Implements the LatentSource trait from Layer 3.
pub struct NpyLatentLoader {
    latents_path:    String,
    transforms_path: Option<String>,
}

impl NpyLatentLoader {
    pub fn new(latents_path: impl Into<String>, transforms_path: Option<String>) -> Self {
        Self {
            latents_path: latents_path.into(),
            transforms_path,
        }
    }
}

impl LatentSource for NpyLatentLoader {
    fn load(&self) -> Result<LatentSet> {
        let latents = read_f32_array(Path::new(&self.latents_path))?;
        if latents.ndim() < 2 {
            bail!(
                "Latent file '{}' must have a sample axis plus at least one data axis, got shape {:?}",
                self.latents_path,
                latents.shape()
            );
        }

        let sample_shape = latents.shape()[1..].to_vec();
        let mut samples: Vec<LatentSample> = latents
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(index, row)| LatentSample {
                index,
                code: row.iter().copied().collect(),
                transform: None,
            })
            .collect();

        tracing::info!(
            "Loaded {} latents of shape {:?} from '{}'",
            samples.len(),
            sample_shape,
            self.latents_path
        );

        if let Some(path) = self.transforms_path.as_deref() {
            let transforms = load_transforms(Path::new(path))?;
            if transforms.len() < samples.len() {
                bail!(
                    "Transform file '{}' has {} entries but there are {} latents",
                    path,
                    transforms.len(),
                    samples.len()
                );
            }
            for (sample, t) in samples.iter_mut().zip(transforms) {
                sample.transform = Some(t);
            }
            tracing::info!("Attached per-sample transforms from '{}'", path);
        }

        LatentSet::new(sample_shape, samples)
    }
}

/// Read a `[N, 3, 3]` transform array into row-major 3x3 matrices.
fn load_transforms(path: &Path) -> Result<Vec<Transform>> {
    let arr = read_f32_array(path)?;
    if arr.ndim() != 3 || arr.shape()[1] != 3 || arr.shape()[2] != 3 {
        bail!(
            "Transform file '{}' must have shape [N, 3, 3], got {:?}",
            path.display(),
            arr.shape()
        );
    }

    let transforms = arr
        .axis_iter(Axis(0))
        .map(|m| {
            let mut t = [0.0f32; 9];
            for (dst, src) in t.iter_mut().zip(m.iter()) {
                *dst = *src;
            }
            t
        })
        .collect();
    Ok(transforms)
}

/// Read an `.npy` file as f32, accepting f64 files too.
fn read_f32_array(path: &Path) -> Result<ArrayD<f32>> {
    let open = || {
        File::open(path).with_context(|| format!("Cannot open '{}'", path.display()))
    };

    match ArrayD::<f32>::read_npy(open()?) {
        Ok(arr) => Ok(arr),
        Err(f32_err) => {
            // np.save defaults to float64 for arrays built from Python floats
            let arr = ArrayD::<f64>::read_npy(open()?).with_context(|| {
                format!("Cannot read '{}' as f32 ({f32_err}) or f64", path.display())
            })?;
            Ok(arr.mapv(|v| v as f32))
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use ndarray_npy::WriteNpyExt;

    fn write_npy<A: WriteNpyExt>(path: &Path, arr: &A) {
        let file = File::create(path).unwrap();
        arr.write_npy(file).unwrap();
    }

    #[test]
    fn test_loads_latents_in_file_order() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("latents.npy");
        let arr  = Array3::<f32>::from_shape_fn((3, 2, 4), |(n, i, j)| (n * 100 + i * 10 + j) as f32);
        write_npy(&path, &arr);

        let set = NpyLatentLoader::new(path.to_string_lossy(), None).load().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.sample_shape, vec![2, 4]);
        assert_eq!(set.samples[2].index, 2);
        assert_eq!(set.samples[2].code[0], 200.0);
        assert_eq!(set.samples[1].code[7], 113.0);
        assert!(!set.has_transforms());
    }

    #[test]
    fn test_attaches_f64_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let latents_path    = dir.path().join("latents.npy");
        let transforms_path = dir.path().join("transforms.npy");
        write_npy(&latents_path, &Array2::<f32>::zeros((2, 4)));
        let t = Array3::<f64>::from_shape_fn((2, 3, 3), |(n, i, j)| {
            if i == j { 1.0 + n as f64 } else { 0.0 }
        });
        write_npy(&transforms_path, &t);

        let set = NpyLatentLoader::new(
            latents_path.to_string_lossy(),
            Some(transforms_path.to_string_lossy().into_owned()),
        )
        .load()
        .unwrap();

        assert!(set.has_transforms());
        assert_eq!(set.samples[1].transform.unwrap()[0], 2.0);
        assert_eq!(set.samples[1].transform.unwrap()[1], 0.0);
    }

    #[test]
    fn test_too_few_transforms_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let latents_path    = dir.path().join("latents.npy");
        let transforms_path = dir.path().join("transforms.npy");
        write_npy(&latents_path, &Array2::<f32>::zeros((3, 4)));
        write_npy(&transforms_path, &Array3::<f32>::zeros((2, 3, 3)));

        let res = NpyLatentLoader::new(
            latents_path.to_string_lossy(),
            Some(transforms_path.to_string_lossy().into_owned()),
        )
        .load();
        assert!(res.is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let res = NpyLatentLoader::new("does/not/exist.npy", None).load();
        assert!(res.is_err());
    }
}
