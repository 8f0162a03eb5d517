//! End-to-end training from a run specification

use super::{Pix2PixTrainer, TrainingReport};
use crate::autograd::Context;
use crate::cli::{log, LogLevel};
use crate::config::RunSpec;
use crate::data::{DataLoader, PairedDataset};
use crate::glyph::{render_training_pairs, FontRenderer};
use crate::nn::{Module, PatchDiscriminator, UNetGenerator};
use crate::Result;

/// Render the training glyph set with both fonts into the data directories
///
/// Returns the number of pairs written.
pub fn prepare_training_pairs(spec: &RunSpec) -> Result<usize> {
    let reference = FontRenderer::new(&spec.fonts.reference)?;
    let target = FontRenderer::new(&spec.fonts.target)?;
    let glyphs = spec.glyphs.train.chars()?;
    render_training_pairs(
        &reference,
        &target,
        &glyphs,
        &spec.data.source_dir,
        &spec.data.target_dir,
        spec.data.image_size,
    )
}

/// Build the dataset, both networks and the trainer, then train
///
/// With `render` set, training pairs are rendered first. An empty dataset
/// aborts before any network is constructed.
pub fn train_from_spec(spec: &RunSpec, render: bool, level: LogLevel) -> Result<TrainingReport> {
    if render {
        let written = prepare_training_pairs(spec)?;
        log(level, LogLevel::Normal, &format!("Rendered {written} training pairs"));
    }

    let dataset = PairedDataset::new(&spec.data.source_dir, &spec.data.target_dir)?;
    dataset.ensure_non_empty()?;
    log(
        level,
        LogLevel::Normal,
        &format!("Dataset: {} pairs ({} skipped)", dataset.len(), dataset.skipped().len()),
    );

    let loader = DataLoader::new(dataset, spec.data.batch_size)
        .with_shuffle(spec.data.shuffle)
        .with_num_workers(spec.data.num_workers)?;

    let mut ctx = Context::with_seed(spec.training.seed);
    let generator = UNetGenerator::new(spec.model.generator_config(), &mut ctx)?;
    let discriminator = PatchDiscriminator::new(spec.model.discriminator_config(), &mut ctx)?;
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "Device: {}, seed {}, G {} params, D {} params",
            ctx.device(),
            ctx.seed(),
            generator.num_parameters(),
            discriminator.num_parameters()
        ),
    );

    let mut trainer = Pix2PixTrainer::new(generator, discriminator, spec.train_config(), ctx)
        .with_log_level(level);
    trainer.train(&loader)
}
