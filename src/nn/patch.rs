//! PatchGAN discriminator: a grid of real/fake logits over (source, candidate) pairs

use super::layer::{scoped, Activation, BatchNorm2d, Conv2d, Initialize, Module};
use super::unet::{LEAKY_SLOPE, MAX_WIDTH_MULT};
use crate::autograd::{concat_channels, ConvGeometry, Context, Tensor};
use crate::{Error, Result};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const DOWN: ConvGeometry = ConvGeometry::new(4, 2, 1);
const FLAT: ConvGeometry = ConvGeometry::new(4, 1, 1);

/// Discriminator hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminatorConfig {
    /// Channels of the concatenated (source, candidate) input
    pub in_channels: usize,
    /// Base width (`ndf`)
    pub ndf: usize,
    /// Number of strided stages (`n_layers`)
    pub n_layers: usize,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self { in_channels: 2, ndf: 64, n_layers: 3 }
    }
}

impl DiscriminatorConfig {
    /// Side length of the logit grid for a square input of side `size`, `None` if it vanishes
    pub fn patch_grid(&self, size: usize) -> Option<usize> {
        let mut s = size;
        for _ in 0..self.n_layers {
            s = DOWN.conv_out(s)?;
        }
        s = FLAT.conv_out(s)?;
        FLAT.conv_out(s).filter(|&g| g > 0)
    }
}

struct Block {
    conv: Conv2d,
    norm: Option<BatchNorm2d>,
    activation: Activation,
}

impl Block {
    fn new(
        in_channels: usize,
        out_channels: usize,
        geometry: ConvGeometry,
        normalized: bool,
        activation: Activation,
    ) -> Self {
        // Convolutions followed by normalization carry no bias
        Self {
            conv: Conv2d::new(in_channels, out_channels, geometry, !normalized),
            norm: normalized.then(|| BatchNorm2d::new(out_channels)),
            activation,
        }
    }
}

impl Initialize for Block {
    fn initialize(&mut self, rng: &mut StdRng) {
        self.conv.initialize(rng);
        if let Some(norm) = &mut self.norm {
            norm.initialize(rng);
        }
    }
}

impl Module for Block {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut h = self.conv.forward(input);
        if let Some(norm) = &self.norm {
            h = norm.forward(&h);
        }
        self.activation.apply(&h)
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = scoped("conv", self.conv.named_parameters());
        if let Some(norm) = &self.norm {
            params.extend(scoped("norm", norm.named_parameters()));
        }
        params
    }

    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        self.norm
            .as_ref()
            .map(|norm| scoped("norm", norm.named_buffers()))
            .unwrap_or_default()
    }

    fn set_training(&mut self, training: bool) {
        if let Some(norm) = &mut self.norm {
            norm.set_training(training);
        }
    }
}

/// Patch-level discriminator producing raw logits
///
/// Layout: conv(s2) + LeakyReLU, `n_layers - 1` × [conv(s2) + BN + LeakyReLU],
/// conv(s1) + BN + LeakyReLU, conv(s1) → 1 channel. Widths double per stage up to `8 × ndf`.
pub struct PatchDiscriminator {
    config: DiscriminatorConfig,
    blocks: Vec<Block>,
}

impl PatchDiscriminator {
    /// Build and initialize a discriminator from the context's random stream
    pub fn new(config: DiscriminatorConfig, ctx: &mut Context) -> Result<Self> {
        if config.n_layers == 0 || config.ndf == 0 || config.in_channels == 0 {
            return Err(Error::Config(
                "discriminator needs at least one layer and positive widths".into(),
            ));
        }

        let ndf = config.ndf;
        let mult = |n: usize| (1usize << n.min(3)).min(MAX_WIDTH_MULT);
        let leaky = Activation::LeakyRelu(LEAKY_SLOPE);

        let mut blocks = vec![Block::new(config.in_channels, ndf, DOWN, false, leaky)];
        for n in 1..config.n_layers {
            blocks.push(Block::new(ndf * mult(n - 1), ndf * mult(n), DOWN, true, leaky));
        }
        let last = config.n_layers;
        blocks.push(Block::new(ndf * mult(last - 1), ndf * mult(last), FLAT, true, leaky));
        blocks.push(Block::new(ndf * mult(last), 1, FLAT, false, Activation::Identity));

        let mut discriminator = Self { config, blocks };
        discriminator.initialize(ctx.rng());
        discriminator.set_training(ctx.is_training());
        Ok(discriminator)
    }

    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }

    /// Logits for a (source, candidate) pair, concatenated along channels
    pub fn score(&self, source: &Tensor, candidate: &Tensor) -> Tensor {
        self.forward(&concat_channels(source, candidate))
    }
}

impl Initialize for PatchDiscriminator {
    fn initialize(&mut self, rng: &mut StdRng) {
        for block in &mut self.blocks {
            block.initialize(rng);
        }
    }
}

impl Module for PatchDiscriminator {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut h = input.clone();
        for block in &self.blocks {
            h = block.forward(&h);
        }
        h
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| scoped(&format!("blocks.{i}"), b.named_parameters()))
            .collect()
    }

    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(i, b)| scoped(&format!("blocks.{i}"), b.named_buffers()))
            .collect()
    }

    fn set_training(&mut self, training: bool) {
        for block in &mut self.blocks {
            block.set_training(training);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(n_layers: usize) -> DiscriminatorConfig {
        DiscriminatorConfig { in_channels: 2, ndf: 4, n_layers }
    }

    #[test]
    fn test_reference_patch_grid() {
        // 256 → 128 → 64 → 32 → 31 → 30
        assert_eq!(DiscriminatorConfig::default().patch_grid(256), Some(30));
        assert_eq!(small(1).patch_grid(16), Some(6));
        assert_eq!(small(3).patch_grid(4), None);
    }

    #[test]
    fn test_output_is_single_channel_grid() {
        let d = PatchDiscriminator::new(small(2), &mut Context::with_seed(5)).unwrap();
        let src = Tensor::zeros(&[2, 1, 32, 32], false);
        let cand = Tensor::ones(&[2, 1, 32, 32], false);
        let logits = d.score(&src, &cand);
        let grid = small(2).patch_grid(32).unwrap();
        assert_eq!(logits.shape(), vec![2, 1, grid, grid]);
    }

    #[test]
    fn test_grid_shrinks_with_input() {
        let cfg = small(2);
        let sizes: Vec<_> = [16, 32, 64].iter().map(|&s| cfg.patch_grid(s).unwrap()).collect();
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_width_schedule_caps_at_eight() {
        let d = PatchDiscriminator::new(
            DiscriminatorConfig { in_channels: 2, ndf: 2, n_layers: 5 },
            &mut Context::with_seed(0),
        )
        .unwrap();
        let widths: Vec<_> = d.blocks.iter().map(|b| b.conv.out_channels()).collect();
        assert_eq!(widths, vec![2, 4, 8, 16, 16, 16, 1]);
    }

    #[test]
    fn test_bias_only_on_unnormalized_convs() {
        let d = PatchDiscriminator::new(small(3), &mut Context::with_seed(0)).unwrap();
        let names: Vec<_> = d.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"blocks.0.conv.bias".to_string()));
        assert!(!names.contains(&"blocks.1.conv.bias".to_string()));
        assert!(names.contains(&"blocks.4.conv.bias".to_string()));
    }

    #[test]
    fn test_rejects_zero_layers() {
        assert!(PatchDiscriminator::new(small(0), &mut Context::with_seed(0)).is_err());
    }
}
