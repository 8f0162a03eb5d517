//! U-Net generator: strided-conv encoder, transposed-conv decoder, skip connections
//!
//! The architecture is described by an ordered list of [`StageSpec`]s computed
//! once by [`stage_plan`]. Each decoder stage declares which encoder stage (if
//! any) is concatenated onto its input, so the wiring can be checked without
//! running the network.

use super::layer::{scoped, Activation, BatchNorm2d, Conv2d, ConvTranspose2d, Initialize, Module};
use crate::autograd::{concat_channels, ConvGeometry, Context, Tensor};
use crate::{Error, Result};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Every sampling stage: kernel 4, stride 2, padding 1
pub const SAMPLING: ConvGeometry = ConvGeometry::new(4, 2, 1);

/// Negative slope of the encoder's leaky rectification
pub const LEAKY_SLOPE: f32 = 0.2;

/// Maximum channel multiplier over the base width
pub const MAX_WIDTH_MULT: usize = 8;

/// Generator hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Base width (`ngf`)
    pub ngf: usize,
    /// Number of downsampling stages
    pub depth: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { in_channels: 1, out_channels: 1, ngf: 64, depth: 8 }
    }
}

impl GeneratorConfig {
    pub const MIN_DEPTH: usize = 2;
    pub const MAX_DEPTH: usize = 8;

    /// Input resolutions must be a multiple of this
    pub fn resolution_multiple(&self) -> usize {
        1 << self.depth
    }

    /// Reject resolutions the encoder cannot halve `depth` times
    pub fn check_resolution(&self, height: usize, width: usize) -> Result<()> {
        let m = self.resolution_multiple();
        if height == 0 || width == 0 || height % m != 0 || width % m != 0 {
            return Err(Error::Shape(format!(
                "generator input {height}x{width} must be a non-zero multiple of {m} (2^{})",
                self.depth
            )));
        }
        Ok(())
    }
}

/// Sampling direction of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Strided convolution, halves resolution
    Down,
    /// Transposed convolution, doubles resolution
    Up,
}

/// Declarative description of one generator stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub kind: StageKind,
    /// Channels entering the stage (after any skip concatenation)
    pub in_channels: usize,
    pub out_channels: usize,
    pub normalized: bool,
    pub bias: bool,
    pub activation: Activation,
    /// Encoder stage whose output is concatenated after this stage's main input
    pub skip_from: Option<usize>,
}

/// Output width of encoder stage `k` (0-based)
fn encoder_width(ngf: usize, k: usize) -> usize {
    ngf * (1usize << k.min(3)).min(MAX_WIDTH_MULT)
}

/// Encoder and decoder stage plans for `config`
///
/// With `d = depth`: encoder stage `i` feeds decoder stage `d - i` (0-based), which
/// runs at the same resolution as encoder stage `i` produces.
pub fn stage_plan(config: &GeneratorConfig) -> (Vec<StageSpec>, Vec<StageSpec>) {
    let d = config.depth;
    let ngf = config.ngf;

    let encoder = (0..d)
        .map(|k| {
            let in_channels = if k == 0 { config.in_channels } else { encoder_width(ngf, k - 1) };
            let (normalized, activation) = match k {
                0 => (false, Activation::LeakyRelu(LEAKY_SLOPE)),
                _ if k == d - 1 => (false, Activation::Relu),
                _ => (true, Activation::LeakyRelu(LEAKY_SLOPE)),
            };
            StageSpec {
                kind: StageKind::Down,
                in_channels,
                out_channels: encoder_width(ngf, k),
                normalized,
                bias: false,
                activation,
                skip_from: None,
            }
        })
        .collect::<Vec<_>>();

    let mut decoder = Vec::with_capacity(d);
    let mut carried = encoder_width(ngf, d - 1);
    for j in 0..d {
        let skip_from = (j > 0).then(|| d - 1 - j);
        let in_channels = carried + skip_from.map_or(0, |s| encoder_width(ngf, s));
        let spec = if j == d - 1 {
            StageSpec {
                kind: StageKind::Up,
                in_channels,
                out_channels: config.out_channels,
                normalized: false,
                bias: true,
                activation: Activation::Tanh,
                skip_from,
            }
        } else {
            StageSpec {
                kind: StageKind::Up,
                in_channels,
                out_channels: encoder_width(ngf, d - 2 - j),
                normalized: true,
                bias: false,
                activation: Activation::Relu,
                skip_from,
            }
        };
        carried = spec.out_channels;
        decoder.push(spec);
    }

    (encoder, decoder)
}

enum Sampler {
    Down(Conv2d),
    Up(ConvTranspose2d),
}

/// A built stage: sampler, optional normalization, activation
struct Stage {
    spec: StageSpec,
    sampler: Sampler,
    norm: Option<BatchNorm2d>,
}

impl Stage {
    fn build(spec: StageSpec) -> Self {
        let sampler = match spec.kind {
            StageKind::Down => {
                Sampler::Down(Conv2d::new(spec.in_channels, spec.out_channels, SAMPLING, spec.bias))
            }
            StageKind::Up => Sampler::Up(ConvTranspose2d::new(
                spec.in_channels,
                spec.out_channels,
                SAMPLING,
                spec.bias,
            )),
        };
        let norm = spec.normalized.then(|| BatchNorm2d::new(spec.out_channels));
        Self { spec, sampler, norm }
    }
}

impl Initialize for Stage {
    fn initialize(&mut self, rng: &mut StdRng) {
        match &mut self.sampler {
            Sampler::Down(conv) => conv.initialize(rng),
            Sampler::Up(conv) => conv.initialize(rng),
        }
        if let Some(norm) = &mut self.norm {
            norm.initialize(rng);
        }
    }
}

impl Module for Stage {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut h = match &self.sampler {
            Sampler::Down(conv) => conv.forward(input),
            Sampler::Up(conv) => conv.forward(input),
        };
        if let Some(norm) = &self.norm {
            h = norm.forward(&h);
        }
        self.spec.activation.apply(&h)
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = match &self.sampler {
            Sampler::Down(conv) => scoped("conv", conv.named_parameters()),
            Sampler::Up(conv) => scoped("conv", conv.named_parameters()),
        };
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

/// U-Net image-to-image generator
pub struct UNetGenerator {
    config: GeneratorConfig,
    encoder: Vec<Stage>,
    decoder: Vec<Stage>,
}

impl UNetGenerator {
    /// Build and initialize a generator from the context's random stream
    pub fn new(config: GeneratorConfig, ctx: &mut Context) -> Result<Self> {
        if !(GeneratorConfig::MIN_DEPTH..=GeneratorConfig::MAX_DEPTH).contains(&config.depth) {
            return Err(Error::Config(format!(
                "generator depth {} outside {}..={}",
                config.depth,
                GeneratorConfig::MIN_DEPTH,
                GeneratorConfig::MAX_DEPTH
            )));
        }
        if config.ngf == 0 || config.in_channels == 0 || config.out_channels == 0 {
            return Err(Error::Config("generator widths must be positive".into()));
        }

        let (enc, dec) = stage_plan(&config);
        let mut generator = Self {
            config,
            encoder: enc.into_iter().map(Stage::build).collect(),
            decoder: dec.into_iter().map(Stage::build).collect(),
        };
        generator.initialize(ctx.rng());
        generator.set_training(ctx.is_training());
        Ok(generator)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Stage descriptors, encoder first
    pub fn stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.encoder.iter().chain(&self.decoder).map(|s| &s.spec)
    }

    /// Forward pass with the input resolution checked up front
    pub fn try_forward(&self, input: &Tensor) -> Result<Tensor> {
        let shape = input.shape();
        if shape.len() != 4 || shape[1] != self.config.in_channels {
            return Err(Error::Shape(format!(
                "generator expects [N, {}, H, W], got {shape:?}",
                self.config.in_channels
            )));
        }
        self.config.check_resolution(shape[2], shape[3])?;
        Ok(self.forward(input))
    }
}

impl Initialize for UNetGenerator {
    fn initialize(&mut self, rng: &mut StdRng) {
        for stage in self.encoder.iter_mut().chain(self.decoder.iter_mut()) {
            stage.initialize(rng);
        }
    }
}

impl Module for UNetGenerator {
    fn forward(&self, input: &Tensor) -> Tensor {
        let mut skips: Vec<Tensor> = Vec::with_capacity(self.encoder.len());
        let mut h = input.clone();
        for stage in &self.encoder {
            h = stage.forward(&h);
            skips.push(h.clone());
        }
        for stage in &self.decoder {
            let stage_input = match stage.spec.skip_from {
                Some(i) => concat_channels(&h, &skips[i]),
                None => h,
            };
            h = stage.forward(&stage_input);
        }
        h
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let enc = self.encoder.iter().enumerate();
        let dec = self.decoder.iter().enumerate();
        enc.flat_map(|(i, s)| scoped(&format!("encoder.{i}"), s.named_parameters()))
            .chain(dec.flat_map(|(i, s)| scoped(&format!("decoder.{i}"), s.named_parameters())))
            .collect()
    }

    fn named_buffers(&self) -> Vec<(String, Tensor)> {
        let enc = self.encoder.iter().enumerate();
        let dec = self.decoder.iter().enumerate();
        enc.flat_map(|(i, s)| scoped(&format!("encoder.{i}"), s.named_buffers()))
            .chain(dec.flat_map(|(i, s)| scoped(&format!("decoder.{i}"), s.named_buffers())))
            .collect()
    }

    fn set_training(&mut self, training: bool) {
        for stage in self.encoder.iter_mut().chain(self.decoder.iter_mut()) {
            stage.set_training(training);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::no_grad;

    fn small(depth: usize) -> GeneratorConfig {
        GeneratorConfig { in_channels: 1, out_channels: 1, ngf: 4, depth }
    }

    #[test]
    fn test_full_depth_plan_matches_reference_widths() {
        let (enc, dec) = stage_plan(&GeneratorConfig::default());
        let enc_out: Vec<_> = enc.iter().map(|s| s.out_channels).collect();
        assert_eq!(enc_out, vec![64, 128, 256, 512, 512, 512, 512, 512]);

        let dec_in: Vec<_> = dec.iter().map(|s| s.in_channels).collect();
        assert_eq!(dec_in, vec![512, 1024, 1024, 1024, 1024, 512, 256, 128]);
        let dec_out: Vec<_> = dec.iter().map(|s| s.out_channels).collect();
        assert_eq!(dec_out, vec![512, 512, 512, 512, 256, 128, 64, 1]);
    }

    #[test]
    fn test_skip_sources_mirror_encoder() {
        let (enc, dec) = stage_plan(&GeneratorConfig::default());
        let skips: Vec<_> = dec.iter().map(|s| s.skip_from).collect();
        assert_eq!(skips, vec![None, Some(6), Some(5), Some(4), Some(3), Some(2), Some(1), Some(0)]);

        // The concatenated width always equals the previous decoder output plus the skip source
        for (j, spec) in dec.iter().enumerate().skip(1) {
            let skip = enc[spec.skip_from.unwrap()].out_channels;
            assert_eq!(spec.in_channels, dec[j - 1].out_channels + skip);
        }
    }

    #[test]
    fn test_stage_activations() {
        let (enc, dec) = stage_plan(&small(4));
        assert!(!enc[0].normalized);
        assert_eq!(enc[0].activation, Activation::LeakyRelu(0.2));
        assert!(enc[1].normalized && enc[2].normalized);
        assert_eq!(enc[3].activation, Activation::Relu);
        assert!(!enc[3].normalized);
        assert!(dec[..3].iter().all(|s| s.normalized && s.activation == Activation::Relu));
        assert_eq!(dec[3].activation, Activation::Tanh);
        assert!(dec[3].bias);
        assert!(enc.iter().all(|s| !s.bias));
    }

    #[test]
    fn test_forward_preserves_resolution_and_range() {
        let mut ctx = Context::with_seed(3);
        let g = UNetGenerator::new(small(3), &mut ctx).unwrap();
        let x = Tensor::full(&[2, 1, 16, 16], 0.5, false);
        let y = g.try_forward(&x).unwrap();
        assert_eq!(y.shape(), vec![2, 1, 16, 16]);
        assert!(y.data().iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_minimum_depth_builds() {
        let mut ctx = Context::with_seed(3);
        let g = UNetGenerator::new(small(2), &mut ctx).unwrap();
        let y = no_grad(|| g.forward(&Tensor::zeros(&[1, 1, 4, 4], false)));
        assert_eq!(y.shape(), vec![1, 1, 4, 4]);
    }

    #[test]
    fn test_rejects_non_divisible_resolution() {
        let mut ctx = Context::with_seed(3);
        let g = UNetGenerator::new(small(3), &mut ctx).unwrap();
        let err = g.try_forward(&Tensor::zeros(&[1, 1, 12, 12], false)).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_rejects_depth_out_of_range() {
        let mut ctx = Context::with_seed(3);
        assert!(UNetGenerator::new(small(1), &mut ctx).is_err());
        assert!(UNetGenerator::new(small(9), &mut ctx).is_err());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = UNetGenerator::new(small(2), &mut Context::with_seed(11)).unwrap();
        let b = UNetGenerator::new(small(2), &mut Context::with_seed(11)).unwrap();
        for ((na, ta), (nb, tb)) in a.named_parameters().iter().zip(b.named_parameters().iter()) {
            assert_eq!(na, nb);
            assert_eq!(ta.to_vec(), tb.to_vec());
        }
    }

    #[test]
    fn test_parameter_names_are_unique() {
        let g = UNetGenerator::new(small(3), &mut Context::with_seed(1)).unwrap();
        let names: std::collections::HashSet<_> =
            g.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), g.named_parameters().len());
        assert!(names.contains("encoder.0.conv.weight"));
        assert!(names.contains("decoder.2.conv.bias"));
        assert!(g.named_buffers().iter().any(|(n, _)| n == "encoder.1.norm.running_var"));
    }
}
