// ============================================================
// Layer 5 — Synthesis Network (decoder)
// ============================================================
// Maps per-layer latents ws [B, n_latents, w_dim] to images
// [B, 3, R, R] in roughly [-1, 1]. Layout follows StyleGAN3:
//
//   ws[:, 0]        → SynthesisInput   Fourier features on an
//                                      S×S grid, rotated and
//                                      translated by the transform
//   ws[:, 1..n-1]   → SynthesisLayer × (n_latents − 2)
//                                      modulated 3×3 conv with
//                                      demodulation, nearest 2×
//                                      upsampling on a fixed schedule
//   ws[:, n-1]      → ToRGB            modulated 1×1 conv, no demod
//
// The transform is passed in explicitly per call; when absent
// the identity is used.
//
// Reference: Karras et al. (2021) Alias-Free GAN (StyleGAN3)

use std::f64::consts::{PI, SQRT_2};

use burn::{
    module::Param,
    prelude::*,
    tensor::{
        activation::leaky_relu,
        module::{conv2d, interpolate},
        ops::{ConvOptions, InterpolateMode, InterpolateOptions},
        Distribution,
    },
};

use crate::ml::mapper::EqualLinear;

const CONV_CLAMP: f64 = 256.0;

#[derive(Config, Debug)]
pub struct SynthesisConfig {
    pub w_dim:         usize,
    pub n_latents:     usize,
    pub channels:      usize,
    pub input_size:    usize,
    pub resolution:    usize,
    pub sampling_rate: f64,
    pub bandwidth:     f64,
}

impl SynthesisConfig {
    pub fn num_layers(&self) -> usize {
        self.n_latents.saturating_sub(2)
    }

    /// Output resolution of every synthesis layer.
    pub fn layer_resolutions(&self) -> Vec<usize> {
        layer_resolutions(self.num_layers(), self.effective_input_size(), self.resolution)
    }

    /// Without any conv layer the input grid must already be full size.
    fn effective_input_size(&self) -> usize {
        if self.num_layers() == 0 { self.resolution } else { self.input_size.min(self.resolution) }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SynthesisNetwork<B> {
        let input = SynthesisInput::new(
            self.w_dim,
            self.channels,
            self.effective_input_size(),
            self.sampling_rate,
            self.bandwidth,
            device,
        );

        let mut prev = self.effective_input_size();
        let layers = self
            .layer_resolutions()
            .into_iter()
            .map(|res| {
                let layer = SynthesisLayer::new(
                    self.w_dim, self.channels, self.channels, 3,
                    true, true, res > prev, device,
                );
                prev = res;
                layer
            })
            .collect();

        let torgb = SynthesisLayer::new(self.w_dim, self.channels, 3, 1, false, false, false, device);

        SynthesisNetwork { input, layers, torgb, n_latents: self.n_latents }
    }
}

/// Layer i sits at `input · 2^floor((i+1)·steps / n)` so the last
/// layer reaches `resolution` and each layer at most doubles.
pub fn layer_resolutions(num_layers: usize, input_size: usize, resolution: usize) -> Vec<usize> {
    let steps = (resolution / input_size.max(1)).trailing_zeros() as usize;
    (0..num_layers)
        .map(|i| (input_size << ((i + 1) * steps / num_layers)).min(resolution))
        .collect()
}

// ─── SynthesisInput ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SynthesisInput<B: Backend> {
    /// w → (cos, sin, tx, ty); starts as the identity
    pub affine:  EqualLinear<B>,
    /// [channels, 2]
    pub freqs:   Param<Tensor<B, 2>>,
    /// [channels]
    pub phases:  Param<Tensor<B, 1>>,
    /// [channels, channels]
    pub weight:  Param<Tensor<B, 2>>,
    channels:      usize,
    size:          usize,
    sampling_rate: f64,
    bandwidth:     f64,
}

impl<B: Backend> SynthesisInput<B> {
    pub fn new(
        w_dim:         usize,
        channels:      usize,
        size:          usize,
        sampling_rate: f64,
        bandwidth:     f64,
        device:        &B::Device,
    ) -> Self {
        let affine = EqualLinear::from_tensors(
            Tensor::zeros([4, w_dim], device),
            Tensor::from_floats([1.0, 0.0, 0.0, 0.0], device),
            1.0,
            false,
        );

        // Frequencies spread inside the bandwidth disc
        let freqs  = Tensor::<B, 2>::random([channels, 2], Distribution::Normal(0.0, 1.0), device);
        let radii  = freqs.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let spread = radii.clone() * radii.powf_scalar(2.0).exp().powf_scalar(0.25);
        let freqs  = (freqs / spread).mul_scalar(bandwidth);
        let phases = Tensor::random([channels], Distribution::Uniform(-0.5, 0.5), device);
        let weight = Tensor::random([channels, channels], Distribution::Normal(0.0, 1.0), device);

        Self {
            affine,
            freqs:  Param::from_tensor(freqs),
            phases: Param::from_tensor(phases),
            weight: Param::from_tensor(weight),
            channels,
            size,
            sampling_rate,
            bandwidth,
        }
    }

    /// w: [B, w_dim], transform: [B, 3, 3] → [B, channels, size, size]
    pub fn forward(&self, w: Tensor<B, 2>, transform: Tensor<B, 3>) -> Tensor<B, 4> {
        let device = w.device();
        let [b, _] = w.dims();
        let c = self.channels;
        let s = self.size;

        // ── Rotation + translation predicted from w ───────────────────────────
        let t    = self.affine.forward(w);
        let norm = t.clone().slice([0..b, 0..2]).powf_scalar(2.0).sum_dim(1).sqrt();
        let t    = t / norm;

        let col   = |i: usize| t.clone().slice([0..b, i..i + 1]);
        let zeros = Tensor::<B, 2>::zeros([b, 1], &device);
        let ones  = Tensor::<B, 2>::ones([b, 1], &device);

        let m_r = Tensor::cat(
            vec![
                col(0), col(1).neg(), zeros.clone(),
                col(1), col(0),       zeros.clone(),
                zeros.clone(), zeros.clone(), ones.clone(),
            ],
            1,
        )
        .reshape([b, 3, 3]);
        let m_t = Tensor::cat(
            vec![
                ones.clone(),  zeros.clone(), col(2).neg(),
                zeros.clone(), ones.clone(),  col(3).neg(),
                zeros.clone(), zeros,         ones,
            ],
            1,
        )
        .reshape([b, 3, 3]);
        let transforms = m_r.matmul(m_t).matmul(transform);

        // ── Transform frequencies and phases ──────────────────────────────────
        let freqs  = self.freqs.val().unsqueeze::<3>().repeat_dim(0, b);
        let shift  = freqs.clone().matmul(transforms.clone().slice([0..b, 0..2, 2..3]));
        let phases = self.phases.val().unsqueeze::<2>() + shift.reshape([b, c]);
        let freqs  = freqs.matmul(transforms.slice([0..b, 0..2, 0..2]));

        // Fade out frequencies above the band limit
        let amplitudes = freqs
            .clone()
            .powf_scalar(2.0)
            .sum_dim(2)
            .sqrt()
            .reshape([b, c])
            .sub_scalar(self.bandwidth)
            .div_scalar(self.sampling_rate / 2.0 - self.bandwidth)
            .neg()
            .add_scalar(1.0)
            .clamp(0.0, 1.0);

        // ── Sample the sinusoids on the grid ──────────────────────────────────
        let grid = sampling_grid::<B>(s, self.sampling_rate, &device)
            .unsqueeze::<3>()
            .repeat_dim(0, b);
        let x = grid.matmul(freqs.swap_dims(1, 2));
        let x = (x + phases.unsqueeze_dim::<3>(1)).mul_scalar(2.0 * PI).sin();
        let x = x * amplitudes.unsqueeze_dim::<3>(1);

        // ── Mix channels ──────────────────────────────────────────────────────
        let weight = self.weight.val().div_scalar((c as f64).sqrt());
        x.reshape([b * s * s, c])
            .matmul(weight.transpose())
            .reshape([b, s, s, c])
            .permute([0, 3, 1, 2])
    }
}

/// Pixel-centre coordinates of an S×S grid in sample units,
/// (x, y) per row, row-major: [S*S, 2].
fn sampling_grid<B: Backend>(size: usize, sampling_rate: f64, device: &B::Device) -> Tensor<B, 2> {
    let extent = 0.5 * size as f64 / sampling_rate;
    let coord  = |i: usize| ((2 * i + 1) as f64 / size as f64 - 1.0) * extent;

    let mut data = Vec::with_capacity(size * size * 2);
    for row in 0..size {
        for col in 0..size {
            data.push(coord(col) as f32);
            data.push(coord(row) as f32);
        }
    }
    Tensor::from_data(TensorData::new(data, [size * size, 2]), device)
}

// ─── SynthesisLayer ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SynthesisLayer<B: Backend> {
    /// w → per-input-channel styles
    pub affine: EqualLinear<B>,
    /// [out, in, k, k]
    pub weight: Param<Tensor<B, 4>>,
    /// [out]
    pub bias:   Param<Tensor<B, 1>>,
    kernel:     usize,
    demodulate: bool,
    activate:   bool,
    upsample:   bool,
}

impl<B: Backend> SynthesisLayer<B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        w_dim:        usize,
        in_channels:  usize,
        out_channels: usize,
        kernel:       usize,
        demodulate:   bool,
        activate:     bool,
        upsample:     bool,
        device:       &B::Device,
    ) -> Self {
        Self {
            affine: EqualLinear::new(w_dim, in_channels, 1.0, 1.0, false, device),
            weight: Param::from_tensor(Tensor::random(
                [out_channels, in_channels, kernel, kernel],
                Distribution::Normal(0.0, 1.0),
                device,
            )),
            bias: Param::from_tensor(Tensor::zeros([out_channels], device)),
            kernel,
            demodulate,
            activate,
            upsample,
        }
    }

    /// x: [B, in, H, W], w: [B, w_dim] → [B, out, H', W']
    pub fn forward(&self, x: Tensor<B, 4>, w: Tensor<B, 2>) -> Tensor<B, 4> {
        let x = if self.upsample {
            let [_, _, h, wd] = x.dims();
            interpolate(
                x,
                [h * 2, wd * 2],
                InterpolateOptions::new(InterpolateMode::Nearest),
            )
        } else {
            x
        };

        let [b, cin, h, wd] = x.dims();
        let [cout, _, k, _] = self.weight.dims();

        let mut styles = self.affine.forward(w);
        if !self.demodulate {
            styles = styles.mul_scalar(1.0 / ((cin * k * k) as f64).sqrt());
        }

        // ── Modulate: one kernel per sample ───────────────────────────────────
        let mut weight = self.weight.val().unsqueeze::<5>().repeat_dim(0, b)
            * styles.reshape([b, 1, cin, 1, 1]);

        if self.demodulate {
            let dcoefs = weight
                .clone()
                .powf_scalar(2.0)
                .sum_dim(4)
                .sum_dim(3)
                .sum_dim(2)
                .add_scalar(1e-8)
                .sqrt()
                .recip();
            weight = weight * dcoefs;
        }

        // ── Grouped conv: the batch becomes the group axis ────────────────────
        let pad = self.kernel / 2;
        let out = conv2d(
            x.reshape([1, b * cin, h, wd]),
            weight.reshape([b * cout, cin, k, k]),
            None,
            ConvOptions::new([1, 1], [pad, pad], [1, 1], b),
        )
        .reshape([b, cout, h, wd]);

        let out = out + self.bias.val().reshape([1, cout, 1, 1]);

        if self.activate {
            leaky_relu(out, 0.2)
                .mul_scalar(SQRT_2)
                .clamp(-CONV_CLAMP, CONV_CLAMP)
        } else {
            out
        }
    }
}

// ─── SynthesisNetwork ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SynthesisNetwork<B: Backend> {
    pub input:  SynthesisInput<B>,
    pub layers: Vec<SynthesisLayer<B>>,
    pub torgb:  SynthesisLayer<B>,
    n_latents:  usize,
}

impl<B: Backend> SynthesisNetwork<B> {
    pub fn n_latents(&self) -> usize {
        self.n_latents
    }

    /// ws: [B, n_latents, w_dim], transform: [B, 3, 3] → [B, 3, R, R]
    pub fn forward(&self, ws: Tensor<B, 3>, transform: Option<Tensor<B, 3>>) -> Tensor<B, 4> {
        let [b, n, d] = ws.dims();
        let device    = ws.device();
        let w_at      = |i: usize| ws.clone().slice([0..b, i..i + 1, 0..d]).reshape([b, d]);

        let transform = transform.unwrap_or_else(|| identity_transforms(b, &device));

        let mut x = self.input.forward(w_at(0), transform);
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x, w_at(i + 1));
        }
        self.torgb.forward(x, w_at(n - 1))
    }
}

/// [B, 3, 3] stack of identity matrices.
pub fn identity_transforms<B: Backend>(batch: usize, device: &B::Device) -> Tensor<B, 3> {
    let eye: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
    let data: Vec<f32> = (0..batch).flat_map(|_| eye).collect();
    Tensor::from_data(TensorData::new(data, [batch, 3, 3]), device)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_config() -> SynthesisConfig {
        // 8px generator → 4 latents → 2 conv layers
        SynthesisConfig::new(8, 4, 4, 4, 8, 16.0, 2.0)
    }

    #[test]
    fn test_layer_resolutions_reach_target() {
        assert_eq!(layer_resolutions(2, 4, 8), vec![4, 8]);
        let res = layer_resolutions(16, 16, 1024);
        assert_eq!(*res.last().unwrap(), 1024);
        // Never more than a doubling between neighbours
        let mut prev = 16;
        for r in res {
            assert!(r == prev || r == prev * 2);
            prev = r;
        }
    }

    #[test]
    fn test_no_layers_uses_full_size_input() {
        let cfg = SynthesisConfig::new(8, 2, 4, 2, 4, 16.0, 2.0);
        assert!(cfg.layer_resolutions().is_empty());
        let net: SynthesisNetwork<TestBackend> = cfg.init(&Default::default());
        let ws  = Tensor::<TestBackend, 3>::zeros([1, 2, 8], &Default::default());
        assert_eq!(net.forward(ws, None).dims(), [1, 3, 4, 4]);
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let net: SynthesisNetwork<TestBackend> = small_config().init(&device);
        let ws = Tensor::<TestBackend, 3>::random([2, 4, 8], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(net.forward(ws, None).dims(), [2, 3, 8, 8]);
    }

    #[test]
    fn test_identity_transform_matches_default() {
        let device = Default::default();
        let net: SynthesisNetwork<TestBackend> = small_config().init(&device);
        let ws = Tensor::<TestBackend, 3>::random([2, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        let a = net.forward(ws.clone(), None);
        let b = net.forward(ws, Some(identity_transforms(2, &device)));
        let diff: f32 = (a - b).abs().max().into_scalar();
        assert!(diff < 1e-5);
    }

    #[test]
    fn test_transform_changes_output() {
        let device = Default::default();
        let net: SynthesisNetwork<TestBackend> = small_config().init(&device);
        let ws = Tensor::<TestBackend, 3>::random([1, 4, 8], Distribution::Normal(0.0, 1.0), &device);

        // Translate by a fraction of a sample
        let shifted = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 0.0, 0.3], [0.0, 1.0, 0.1], [0.0, 0.0, 1.0]]],
            &device,
        );
        let a = net.forward(ws.clone(), None);
        let b = net.forward(ws, Some(shifted));
        let diff: f32 = (a - b).abs().max().into_scalar();
        assert!(diff > 0.0);
    }

    #[test]
    fn test_sampling_grid_is_centred() {
        let grid = sampling_grid::<TestBackend>(4, 4.0, &Default::default());
        let v    = grid.into_data().to_vec::<f32>().unwrap();
        // First pixel centre at (-0.375, -0.375), last at (0.375, 0.375)
        assert!((v[0] + 0.375).abs() < 1e-6);
        assert!((v[31] - 0.375).abs() < 1e-6);
    }
}
