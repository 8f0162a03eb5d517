//! Core CLI types - Cli, Command, and argument structs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RunSpec;

/// Glyphforge: synthesize missing glyphs in the style of a target font
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "glyphforge")]
#[command(version)]
#[command(
    about = "Paired glyph-to-glyph translation: learn a target font's style from a reference font"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Render training pairs from both fonts
    Render(RenderArgs),

    /// Render training pairs (unless skipped) and train the networks
    Train(TrainArgs),

    /// Synthesize glyphs with a trained generator
    Generate(GenerateArgs),

    /// Validate a configuration file without running anything
    Validate(ValidateArgs),

    /// Show the execution context and, optionally, a configuration summary
    Info(InfoArgs),
}

/// Arguments for the render command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RenderArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override number of epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Override the L1 reconstruction weight
    #[arg(long)]
    pub l1_lambda: Option<f32>,

    /// Save checkpoints every N epochs
    #[arg(long)]
    pub save_every: Option<usize>,

    /// Override checkpoint directory
    #[arg(short, long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Train on the images already in the data directories
    #[arg(long)]
    pub skip_render: bool,

    /// Dry run (validate config but don't train)
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the generate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct GenerateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Generator checkpoint to load
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Override inference batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Optional YAML configuration to summarize
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply train command overrides to a RunSpec
pub fn apply_overrides(spec: &mut RunSpec, args: &TrainArgs) {
    if let Some(epochs) = args.epochs {
        spec.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        spec.data.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.lr = lr;
    }
    if let Some(l1_lambda) = args.l1_lambda {
        spec.training.l1_lambda = l1_lambda;
    }
    if let Some(save_every) = args.save_every {
        spec.training.save_interval = save_every;
    }
    if let Some(dir) = &args.checkpoint_dir {
        spec.training.checkpoint_dir = dir.clone();
    }
    if let Some(seed) = args.seed {
        spec.training.seed = seed;
    }
}

/// Apply generate command overrides to a RunSpec
pub fn apply_generate_overrides(spec: &mut RunSpec, args: &GenerateArgs) {
    if let Some(checkpoint) = &args.checkpoint {
        spec.inference.checkpoint = Some(checkpoint.clone());
    }
    if let Some(output_dir) = &args.output_dir {
        spec.inference.output_dir = output_dir.clone();
    }
    if let Some(batch_size) = args.batch_size {
        spec.inference.batch_size = batch_size;
    }
}
