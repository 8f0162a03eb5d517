//! Adversarial training loop
//!
//! This module provides:
//! - Loss functions (BCE-with-logits for the discriminator verdict, L1 for reconstruction)
//! - [`Batch`] of paired source/target images
//! - [`Pix2PixTrainer`], which alternates discriminator and generator updates,
//!   logs progress, and checkpoints both networks on a fixed cadence
//!
//! # Example
//!
//! ```no_run
//! use glyphforge::autograd::Context;
//! use glyphforge::data::{DataLoader, PairedDataset};
//! use glyphforge::nn::{DiscriminatorConfig, GeneratorConfig, PatchDiscriminator, UNetGenerator};
//! use glyphforge::train::{Pix2PixTrainer, TrainConfig};
//!
//! # fn main() -> glyphforge::Result<()> {
//! let mut ctx = Context::with_seed(42);
//! let generator = UNetGenerator::new(GeneratorConfig::default(), &mut ctx)?;
//! let discriminator = PatchDiscriminator::new(DiscriminatorConfig::default(), &mut ctx)?;
//!
//! let dataset = PairedDataset::new("data/train/source", "data/train/target")?;
//! let loader = DataLoader::new(dataset, 4).with_shuffle(true);
//!
//! let mut trainer = Pix2PixTrainer::new(generator, discriminator, TrainConfig::default(), ctx);
//! let report = trainer.train(&loader)?;
//! println!("{} generator steps", report.generator_steps);
//! # Ok(())
//! # }
//! ```

mod batch;
mod loss;
mod pipeline;
mod pix2pix;

pub use batch::Batch;
pub use loss::{BCEWithLogitsLoss, L1Loss, LossFn};
pub use pipeline::{prepare_training_pairs, train_from_spec};
pub use pix2pix::{
    EpochSummary, GeneratorLosses, Pix2PixTrainer, StepLosses, TrainConfig, TrainingReport,
};
