//! Convolutional layers and the capabilities every layer exposes

use crate::autograd::{
    batch_norm2d, batch_norm2d_frozen, conv2d, conv_transpose2d, leaky_relu, relu, tanh,
    ConvGeometry, Tensor,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Standard deviation of the normal weight initialization
pub const INIT_STD: f32 = 0.02;

/// Explicit weight initialization, invoked once per layer by a single network traversal
pub trait Initialize {
    /// Draw fresh parameter values from `rng`
    fn initialize(&mut self, rng: &mut StdRng);
}

/// A differentiable network component
pub trait Module {
    /// Forward pass
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Trainable parameters with stable, hierarchical names (`encoder.3.norm.weight`)
    fn named_parameters(&self) -> Vec<(String, Tensor)>;

    /// Non-trainable state persisted alongside parameters (running statistics)
    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        Vec::new()
    }

    /// Trainable parameters in a fixed order
    fn parameters(&self) -> Vec<Tensor> {
        self.named_parameters().into_iter().map(|(_, t)| t).collect()
    }

    /// Total number of trainable scalars
    fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, t)| t.len()).sum()
    }

    /// Switch between training (batch statistics) and evaluation (running statistics)
    fn set_training(&mut self, _training: bool) {}
}

/// Prefix every name in `entries` with `prefix.`
pub(crate) fn scoped(prefix: &str, entries: Vec<(String, Tensor)>) -> Vec<(String, Tensor)> {
    entries
        .into_iter()
        .map(|(name, t)| (format!("{prefix}.{name}"), t))
        .collect()
}

fn fill_normal(t: &Tensor, mean: f32, std: f32, rng: &mut StdRng) {
    let mut data = t.data_mut();
    data.mapv_inplace(|_| {
        let z: f32 = rng.sample(StandardNormal);
        mean + std * z
    });
}

fn fill_constant(t: &Tensor, value: f32) {
    t.data_mut().fill(value);
}

/// Pointwise nonlinearity applied at the end of a stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Leaky ReLU with the given negative slope
    LeakyRelu(f32),
    Relu,
    Tanh,
    /// Raw output (discriminator logits)
    Identity,
}

impl Activation {
    /// Apply to a tensor
    pub fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::LeakyRelu(slope) => leaky_relu(x, slope),
            Activation::Relu => relu(x),
            Activation::Tanh => tanh(x),
            Activation::Identity => x.clone(),
        }
    }
}

/// 2-D convolution, weight `[out, in, k, k]`
pub struct Conv2d {
    pub weight: Tensor,
    pub bias: Option<Tensor>,
    geometry: ConvGeometry,
}

impl Conv2d {
    /// Create a zero-valued layer; call [`Initialize::initialize`] before training
    pub fn new(in_channels: usize, out_channels: usize, geometry: ConvGeometry, bias: bool) -> Self {
        let k = geometry.kernel;
        Self {
            weight: Tensor::zeros(&[out_channels, in_channels, k, k], true),
            bias: bias.then(|| Tensor::zeros(&[out_channels], true)),
            geometry,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape()[0]
    }
}

impl Initialize for Conv2d {
    fn initialize(&mut self, rng: &mut StdRng) {
        fill_normal(&self.weight, 0.0, INIT_STD, rng);
        if let Some(bias) = &self.bias {
            fill_constant(bias, 0.0);
        }
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        conv2d(input, &self.weight, self.bias.as_ref(), self.geometry)
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = vec![("weight".to_string(), self.weight.clone())];
        params.extend(self.bias.iter().map(|b| ("bias".to_string(), b.clone())));
        params
    }
}

/// Transposed 2-D convolution, weight `[in, out, k, k]`
pub struct ConvTranspose2d {
    pub weight: Tensor,
    pub bias: Option<Tensor>,
    geometry: ConvGeometry,
}

impl ConvTranspose2d {
    /// Create a zero-valued layer; call [`Initialize::initialize`] before training
    pub fn new(in_channels: usize, out_channels: usize, geometry: ConvGeometry, bias: bool) -> Self {
        let k = geometry.kernel;
        Self {
            weight: Tensor::zeros(&[in_channels, out_channels, k, k], true),
            bias: bias.then(|| Tensor::zeros(&[out_channels], true)),
            geometry,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.shape()[1]
    }
}

impl Initialize for ConvTranspose2d {
    fn initialize(&mut self, rng: &mut StdRng) {
        fill_normal(&self.weight, 0.0, INIT_STD, rng);
        if let Some(bias) = &self.bias {
            fill_constant(bias, 0.0);
        }
    }
}

impl Module for ConvTranspose2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        conv_transpose2d(input, &self.weight, self.bias.as_ref(), self.geometry)
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = vec![("weight".to_string(), self.weight.clone())];
        params.extend(self.bias.iter().map(|b| ("bias".to_string(), b.clone())));
        params
    }
}

/// Batch normalization over NCHW channels with running statistics
pub struct BatchNorm2d {
    /// Scale (gamma)
    pub weight: Tensor,
    /// Shift (beta)
    pub bias: Tensor,
    pub running_mean: Tensor,
    pub running_var: Tensor,
    momentum: f32,
    eps: f32,
    training: bool,
}

impl BatchNorm2d {
    pub const MOMENTUM: f32 = 0.1;
    pub const EPS: f32 = 1e-5;

    pub fn new(channels: usize) -> Self {
        Self {
            weight: Tensor::ones(&[channels], true),
            bias: Tensor::zeros(&[channels], true),
            running_mean: Tensor::zeros(&[channels], false),
            running_var: Tensor::ones(&[channels], false),
            momentum: Self::MOMENTUM,
            eps: Self::EPS,
            training: true,
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    fn running_stats(&self) -> (Array1<f32>, Array1<f32>) {
        let flat = |t: &Tensor| Array1::from(t.to_vec());
        (flat(&self.running_mean), flat(&self.running_var))
    }
}

impl Initialize for BatchNorm2d {
    fn initialize(&mut self, rng: &mut StdRng) {
        fill_normal(&self.weight, 1.0, INIT_STD, rng);
        fill_constant(&self.bias, 0.0);
        fill_constant(&self.running_mean, 0.0);
        fill_constant(&self.running_var, 1.0);
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, input: &Tensor) -> Tensor {
        if !self.training {
            let (mean, var) = self.running_stats();
            return batch_norm2d_frozen(input, &self.weight, &self.bias, &mean, &var, self.eps);
        }

        let (output, stats) = batch_norm2d(input, &self.weight, &self.bias, self.eps);

        // Running variance tracks the unbiased estimate
        let correction = if stats.count > 1 {
            stats.count as f32 / (stats.count - 1) as f32
        } else {
            1.0
        };
        let m = self.momentum;
        for (r, &b) in self.running_mean.data_mut().iter_mut().zip(stats.mean.iter()) {
            *r = (1.0 - m) * *r + m * b;
        }
        for (r, &b) in self.running_var.data_mut().iter_mut().zip(stats.var.iter()) {
            *r = (1.0 - m) * *r + m * b * correction;
        }

        output
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        vec![
            ("weight".to_string(), self.weight.clone()),
            ("bias".to_string(), self.bias.clone()),
        ]
    }

    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        vec![
            ("running_mean".to_string(), self.running_mean.clone()),
            ("running_var".to_string(), self.running_var.clone()),
        ]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;

    #[test]
    fn test_conv_initialization_statistics() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut conv = Conv2d::new(16, 32, ConvGeometry::new(4, 2, 1), true);
        conv.initialize(&mut rng);

        let w = conv.weight.to_vec();
        let mean = w.iter().sum::<f32>() / w.len() as f32;
        let std = (w.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / w.len() as f32).sqrt();
        assert_abs_diff_eq!(mean, 0.0, epsilon = 2e-3);
        assert_abs_diff_eq!(std, INIT_STD, epsilon = 2e-3);
        assert!(conv.bias.as_ref().unwrap().to_vec().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_batch_norm_initialization() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bn = BatchNorm2d::new(512);
        bn.initialize(&mut rng);

        let gamma = bn.weight.to_vec();
        let mean = gamma.iter().sum::<f32>() / gamma.len() as f32;
        assert_abs_diff_eq!(mean, 1.0, epsilon = 5e-3);
        assert!(gamma.iter().any(|&g| g != 1.0));
        assert!(bn.bias.to_vec().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_named_parameters_without_bias() {
        let conv = ConvTranspose2d::new(4, 2, ConvGeometry::new(4, 2, 1), false);
        let names: Vec<_> = conv.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["weight"]);
        assert_eq!(conv.out_channels(), 2);
    }

    #[test]
    fn test_batch_norm_updates_running_stats_in_training() {
        let bn = BatchNorm2d::new(1);
        // Channel values 0 and 2: mean 1, biased var 1, unbiased var 2
        let x = Tensor::from_shape_vec(&[1, 1, 1, 2], vec![0.0, 2.0], false).unwrap();
        bn.forward(&x);

        assert_abs_diff_eq!(bn.running_mean.to_vec()[0], 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(bn.running_var.to_vec()[0], 0.9 + 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_batch_norm_eval_uses_running_stats() {
        let mut bn = BatchNorm2d::new(1);
        bn.set_training(false);
        let x = Tensor::from_shape_vec(&[1, 1, 1, 2], vec![0.0, 2.0], false).unwrap();
        let y = bn.forward(&x);

        // Running mean 0, var 1: output ≈ input
        let out = y.to_vec();
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bn.running_mean.to_vec()[0], 0.0);
    }

    #[test]
    fn test_activation_identity_is_passthrough() {
        let x = Tensor::from_vec(vec![-1.0, 1.0], false);
        assert_eq!(Activation::Identity.apply(&x).to_vec(), vec![-1.0, 1.0]);
        assert_eq!(Activation::LeakyRelu(0.2).apply(&x).to_vec()[0], -0.2);
    }
}
