// ============================================================
// Layer 5 — Latent Mapper
// ============================================================
// The mapper predicts an edit offset for every per-layer
// latent of a code:
//
//   Mapper        = PixelNorm → 4 × EqualLinear(fused lrelu)
//   LevelsMapper  = coarse  ws[:, 0..4]  → Mapper (or zeros)
//                   medium  ws[:, 4..8]  → Mapper (or zeros)
//                   fine    ws[:, 8..]   → Mapper (or zeros)
//   SingleMapper  = one Mapper over every latent
//
// EqualLinear keeps its weights at unit scale and applies the
// He constant and learning-rate multiplier at runtime:
//   y = x · (W · lr_mul / √in)ᵀ + b · lr_mul
//
// Reference: Karras et al. (2020) StyleGAN2
//            Patashnik et al. (2021) StyleCLIP

use burn::{
    module::Param,
    prelude::*,
    tensor::{activation::leaky_relu, Distribution},
};

use crate::domain::options::MapperType;

/// Gain applied after a fused leaky ReLU
const LRELU_GAIN: f64 = std::f64::consts::SQRT_2;
const LRELU_SLOPE: f64 = 0.2;

/// Learning-rate multiplier of the mapper's linear layers
const MAPPER_LR_MUL: f64 = 0.01;
const MAPPER_DEPTH: usize = 4;

/// Latent ranges owned by the coarse / medium / fine mappers
const COARSE_END: usize = 4;
const MEDIUM_END: usize = 8;

// ─── EqualLinear ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EqualLinear<B: Backend> {
    /// [out_features, in_features], unit scale
    pub weight: Param<Tensor<B, 2>>,
    /// [out_features]
    pub bias:   Param<Tensor<B, 1>>,
    scale:      f64,
    lr_mul:     f64,
    activate:   bool,
}

impl<B: Backend> EqualLinear<B> {
    /// Random N(0, 1/lr_mul²) weights with a constant bias.
    pub fn new(
        in_features:  usize,
        out_features: usize,
        bias_init:    f64,
        lr_mul:       f64,
        activate:     bool,
        device:       &B::Device,
    ) -> Self {
        let weight = Tensor::random([out_features, in_features], Distribution::Normal(0.0, 1.0), device)
            .div_scalar(lr_mul);
        let bias = Tensor::ones([out_features], device).mul_scalar(bias_init);
        Self::from_tensors(weight, bias, lr_mul, activate)
    }

    pub fn from_tensors(weight: Tensor<B, 2>, bias: Tensor<B, 1>, lr_mul: f64, activate: bool) -> Self {
        let [_, in_features] = weight.dims();
        Self {
            weight: Param::from_tensor(weight),
            bias:   Param::from_tensor(bias),
            scale:  lr_mul / (in_features as f64).sqrt(),
            lr_mul,
            activate,
        }
    }

    /// x: [N, in] → [N, out]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let weight = self.weight.val().mul_scalar(self.scale);
        let bias   = self.bias.val().mul_scalar(self.lr_mul).unsqueeze::<2>();
        let out    = x.matmul(weight.transpose()) + bias;

        if self.activate {
            leaky_relu(out, LRELU_SLOPE).mul_scalar(LRELU_GAIN)
        } else {
            out
        }
    }
}

/// x / √(mean(x²) + ε) over the feature axis.
pub fn pixel_norm<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).mean_dim(1).add_scalar(1e-8).sqrt();
    x / norm
}

// ─── Mapper ───────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Mapper<B: Backend> {
    pub layers: Vec<EqualLinear<B>>,
}

impl<B: Backend> Mapper<B> {
    pub fn new(latent_dim: usize, device: &B::Device) -> Self {
        let layers = (0..MAPPER_DEPTH)
            .map(|_| EqualLinear::new(latent_dim, latent_dim, 0.0, MAPPER_LR_MUL, true, device))
            .collect();
        Self { layers }
    }

    /// x: [N, latent_dim] → [N, latent_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = pixel_norm(x);
        for layer in &self.layers {
            x = layer.forward(x);
        }
        x
    }

    /// Apply to a [B, n, d] block of latents.
    fn forward_block(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [b, n, d] = x.dims();
        self.forward(x.reshape([b * n, d])).reshape([b, n, d])
    }
}

// ─── LevelsMapper ─────────────────────────────────────────────────────────────
/// Separate mappers for coarse, medium and fine latents.
/// A disabled level contributes a zero offset.
#[derive(Module, Debug)]
pub struct LevelsMapper<B: Backend> {
    pub coarse: Option<Mapper<B>>,
    pub medium: Option<Mapper<B>>,
    pub fine:   Option<Mapper<B>>,
}

impl<B: Backend> LevelsMapper<B> {
    pub fn new(
        latent_dim: usize,
        coarse:     bool,
        medium:     bool,
        fine:       bool,
        device:     &B::Device,
    ) -> Self {
        let build = |enabled: bool| enabled.then(|| Mapper::new(latent_dim, device));
        Self {
            coarse: build(coarse),
            medium: build(medium),
            fine:   build(fine),
        }
    }

    /// x: [B, n_latents, latent_dim] → offsets of the same shape
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [b, n, d] = x.dims();
        let levels = [
            (0, COARSE_END.min(n), &self.coarse),
            (COARSE_END.min(n), MEDIUM_END.min(n), &self.medium),
            (MEDIUM_END.min(n), n, &self.fine),
        ];

        let parts: Vec<Tensor<B, 3>> = levels
            .into_iter()
            .filter(|(start, end, _)| end > start)
            .map(|(start, end, mapper)| {
                let block = x.clone().slice([0..b, start..end, 0..d]);
                match mapper {
                    Some(m) => m.forward_block(block),
                    None    => block.zeros_like(),
                }
            })
            .collect();

        Tensor::cat(parts, 1)
    }
}

// ─── LatentMapper ─────────────────────────────────────────────────────────────
/// Exactly one of the two layouts is populated.
#[derive(Module, Debug)]
pub struct LatentMapper<B: Backend> {
    pub single: Option<Mapper<B>>,
    pub levels: Option<LevelsMapper<B>>,
}

impl<B: Backend> LatentMapper<B> {
    pub fn new(
        kind:       MapperType,
        latent_dim: usize,
        coarse:     bool,
        medium:     bool,
        fine:       bool,
        device:     &B::Device,
    ) -> Self {
        match kind {
            MapperType::SingleMapper => Self {
                single: Some(Mapper::new(latent_dim, device)),
                levels: None,
            },
            MapperType::LevelsMapper => Self {
                single: None,
                levels: Some(LevelsMapper::new(latent_dim, coarse, medium, fine, device)),
            },
        }
    }

    /// x: [B, n_latents, latent_dim] → edit direction, same shape
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        match (&self.single, &self.levels) {
            (Some(single), _)    => single.forward_block(x),
            (None, Some(levels)) => levels.forward(x),
            (None, None)         => x.zeros_like(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_equal_linear_applies_runtime_scale() {
        let device = Default::default();
        // in=4, lr_mul=1 → scale = 1/2
        let weight = Tensor::<TestBackend, 2>::ones([1, 4], &device);
        let bias   = Tensor::<TestBackend, 1>::from_floats([1.0], &device);
        let layer  = EqualLinear::from_tensors(weight, bias, 1.0, false);

        let x   = Tensor::<TestBackend, 2>::ones([1, 4], &device);
        let out = values(layer.forward(x));
        // 4 * 1 * 0.5 + 1 = 3
        assert!((out[0] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_fused_lrelu_scales_negative_side() {
        let device = Default::default();
        let weight = Tensor::<TestBackend, 2>::ones([1, 1], &device);
        let bias   = Tensor::<TestBackend, 1>::zeros([1], &device);
        let layer  = EqualLinear::from_tensors(weight, bias, 1.0, true);

        let x   = Tensor::<TestBackend, 2>::from_floats([[-1.0]], &device);
        let out = values(layer.forward(x));
        let expected = -0.2 * std::f32::consts::SQRT_2;
        assert!((out[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_pixel_norm_unit_rms() {
        let device = Default::default();
        let x   = Tensor::<TestBackend, 2>::from_floats([[3.0, 4.0]], &device);
        let out = values(pixel_norm(x));
        let rms = ((out[0] * out[0] + out[1] * out[1]) / 2.0).sqrt();
        assert!((rms - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_disabled_levels_give_zero_offsets() {
        let device = Default::default();
        // Only the medium level is active
        let mapper = LevelsMapper::<TestBackend>::new(8, false, true, false, &device);
        let x      = Tensor::<TestBackend, 3>::random([2, 10, 8], Distribution::Normal(0.0, 1.0), &device);
        let out    = mapper.forward(x);
        assert_eq!(out.dims(), [2, 10, 8]);

        let coarse = values(out.clone().slice([0..2, 0..4, 0..8]));
        let fine   = values(out.slice([0..2, 8..10, 0..8]));
        assert!(coarse.iter().all(|v| *v == 0.0));
        assert!(fine.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_levels_mapper_with_few_latents() {
        let device = Default::default();
        let mapper = LevelsMapper::<TestBackend>::new(4, true, true, true, &device);
        let x      = Tensor::<TestBackend, 3>::zeros([1, 4, 4], &device);
        assert_eq!(mapper.forward(x).dims(), [1, 4, 4]);
    }

    #[test]
    fn test_single_mapper_shape() {
        let device = Default::default();
        let mapper = LatentMapper::<TestBackend>::new(MapperType::SingleMapper, 8, true, true, true, &device);
        let x      = Tensor::<TestBackend, 3>::ones([3, 6, 8], &device);
        assert_eq!(mapper.forward(x).dims(), [3, 6, 8]);
    }
}
