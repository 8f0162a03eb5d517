//! YAML schema for a glyph synthesis run
//!
//! Only the two font paths and the training glyph set are required; every
//! other field falls back to the pix2pix defaults.

use super::validate::ValidationError;
use crate::nn::{DiscriminatorConfig, GeneratorConfig};
use crate::train::TrainConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// Complete run specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Font files
    pub fonts: FontsSpec,

    /// Characters to train on and to synthesize
    pub glyphs: GlyphsSpec,

    /// Training image directories and loading
    #[serde(default)]
    pub data: DataSpec,

    /// Network widths and depths
    #[serde(default)]
    pub model: ModelSpec,

    /// Adam hyperparameters
    #[serde(default)]
    pub optimizer: OptimSpec,

    /// Training loop hyperparameters
    #[serde(default)]
    pub training: TrainingParams,

    /// Glyph synthesis settings
    #[serde(default)]
    pub inference: InferenceSpec,
}

/// Font files used by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontsSpec {
    /// Font whose glyphs are learned and whose missing glyphs are synthesized
    pub target: PathBuf,

    /// Font that supplies the source rendering of every glyph
    pub reference: PathBuf,
}

/// A set of characters, either as text or as explicit code points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlyphSet {
    /// Every character of the string is one glyph
    Text(String),
    /// Unicode scalar values
    CodePoints(Vec<u32>),
}

impl GlyphSet {
    /// Distinct characters in first-appearance order
    pub fn chars(&self) -> Result<Vec<char>, ValidationError> {
        let all: Vec<char> = match self {
            GlyphSet::Text(text) => text.chars().collect(),
            GlyphSet::CodePoints(points) => points
                .iter()
                .map(|&cp| char::from_u32(cp).ok_or(ValidationError::InvalidCodePoint(cp)))
                .collect::<Result<_, _>>()?,
        };
        let mut seen = std::collections::HashSet::new();
        Ok(all.into_iter().filter(|c| seen.insert(*c)).collect())
    }
}

/// Character sets for training and synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphsSpec {
    /// Glyphs present in both fonts
    pub train: GlyphSet,

    /// Glyphs to synthesize in the target style
    #[serde(default = "default_generate")]
    pub generate: GlyphSet,
}

fn default_generate() -> GlyphSet {
    GlyphSet::Text("琉球".to_string())
}

/// Data configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSpec {
    /// Rendered reference-font glyphs
    pub source_dir: PathBuf,

    /// Rendered target-font glyphs
    pub target_dir: PathBuf,

    /// Side length of the square glyph images
    pub image_size: u32,

    /// Training batch size
    pub batch_size: usize,

    /// Parallel image decoding threads (0 or 1 decodes inline)
    pub num_workers: usize,

    /// Reshuffle pairs every epoch
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub shuffle: bool,
}

impl Default for DataSpec {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/train/source"),
            target_dir: PathBuf::from("data/train/target"),
            image_size: 256,
            batch_size: 4,
            num_workers: 0,
            shuffle: true,
        }
    }
}

/// Network architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Generator base width
    pub ngf: usize,

    /// Discriminator base width
    pub ndf: usize,

    /// Strided discriminator stages
    pub disc_layers: usize,

    /// U-Net downsampling stages
    pub depth: usize,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            ngf: 64,
            ndf: 64,
            disc_layers: 3,
            depth: 8,
        }
    }
}

impl ModelSpec {
    /// Single-channel glyph → glyph generator
    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            in_channels: 1,
            out_channels: 1,
            ngf: self.ngf,
            depth: self.depth,
        }
    }

    /// Discriminator over (source, candidate) channel pairs
    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            in_channels: 2,
            ndf: self.ndf,
            n_layers: self.disc_layers,
        }
    }
}

/// Optimizer specification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimSpec {
    /// Learning rate
    pub lr: f32,

    /// First moment decay
    pub beta1: f32,

    /// Second moment decay
    pub beta2: f32,
}

impl Default for OptimSpec {
    fn default() -> Self {
        Self {
            lr: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    /// Number of epochs
    pub epochs: usize,

    /// Weight of the L1 reconstruction loss
    pub l1_lambda: f32,

    /// Save checkpoints every N epochs
    pub save_interval: usize,

    /// Log progress every N batches
    pub log_interval: usize,

    /// Output directory for checkpoints
    pub checkpoint_dir: PathBuf,

    /// Seed for initialization and shuffling
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 200,
            l1_lambda: 100.0,
            save_interval: 10,
            log_interval: 50,
            checkpoint_dir: PathBuf::from("checkpoints"),
            seed: 42,
        }
    }
}

/// Synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSpec {
    /// Generator checkpoint; the final-epoch checkpoint when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PathBuf>,

    /// Directory for synthesized glyph images
    pub output_dir: PathBuf,

    /// Glyphs per generator forward pass
    pub batch_size: usize,
}

impl Default for InferenceSpec {
    fn default() -> Self {
        Self {
            checkpoint: None,
            output_dir: PathBuf::from("output"),
            batch_size: 4,
        }
    }
}

impl RunSpec {
    /// Trainer hyperparameters assembled from the optimizer and training sections
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.training.epochs,
            lr: self.optimizer.lr,
            beta1: self.optimizer.beta1,
            beta2: self.optimizer.beta2,
            l1_lambda: self.training.l1_lambda,
            save_interval: self.training.save_interval,
            log_interval: self.training.log_interval,
            checkpoint_dir: self.training.checkpoint_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
fonts:
  target: fonts/target.otf
  reference: fonts/reference.otf
glyphs:
  train: "あいうA"
"#;

    #[test]
    fn test_minimal_spec_uses_defaults() {
        let spec: RunSpec = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(spec.data, DataSpec::default());
        assert_eq!(spec.model, ModelSpec::default());
        assert_eq!(spec.training.epochs, 200);
        assert_eq!(spec.training.l1_lambda, 100.0);
        assert_eq!(spec.inference.batch_size, 4);
        assert_eq!(spec.glyphs.generate.chars().unwrap(), vec!['琉', '球']);
        assert_eq!(spec.glyphs.train.chars().unwrap(), vec!['あ', 'い', 'う', 'A']);
    }

    #[test]
    fn test_code_point_glyph_set() {
        let yaml = format!("{MINIMAL}  generate: [65, 36947]\n");
        let spec: RunSpec = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(spec.glyphs.generate.chars().unwrap(), vec!['A', '道']);
    }

    #[test]
    fn test_invalid_code_point_rejected() {
        let set = GlyphSet::CodePoints(vec![0xD800]);
        assert!(matches!(set.chars(), Err(ValidationError::InvalidCodePoint(0xD800))));
    }

    #[test]
    fn test_duplicate_glyphs_collapse() {
        let set = GlyphSet::Text("ABAB".into());
        assert_eq!(set.chars().unwrap(), vec!['A', 'B']);
    }

    #[test]
    fn test_quoted_shuffle_flag() {
        let yaml = format!("{MINIMAL}data:\n  shuffle: \"false\"\n  batch_size: 2\n");
        let spec: RunSpec = serde_yaml::from_str(&yaml).unwrap();
        assert!(!spec.data.shuffle);
        assert_eq!(spec.data.batch_size, 2);
        assert_eq!(spec.data.image_size, 256);
    }

    #[test]
    fn test_network_configs_follow_model_spec() {
        let model = ModelSpec { ngf: 8, ndf: 16, disc_layers: 2, depth: 4 };
        assert_eq!(model.generator_config().depth, 4);
        assert_eq!(model.discriminator_config().n_layers, 2);
        assert_eq!(model.discriminator_config().in_channels, 2);
    }
}
