//! Configuration validation logic

use super::error::ValidationError;
use crate::config::schema::RunSpec;
use crate::nn::GeneratorConfig;

/// Validate a run specification, font files included
pub fn validate_config(spec: &RunSpec) -> Result<(), ValidationError> {
    validate_fonts(spec)?;
    validate_values(spec)
}

/// Check that both font files exist
pub fn validate_fonts(spec: &RunSpec) -> Result<(), ValidationError> {
    for (role, path) in [("Target", &spec.fonts.target), ("Reference", &spec.fonts.reference)] {
        if !path.is_file() {
            return Err(ValidationError::FontNotFound {
                role,
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Check glyph sets and numeric ranges, without touching the filesystem
pub fn validate_values(spec: &RunSpec) -> Result<(), ValidationError> {
    let train = spec.glyphs.train.chars()?;
    if train.is_empty() {
        return Err(ValidationError::EmptyGlyphSet("train"));
    }
    let overlap: String = spec
        .glyphs
        .generate
        .chars()?
        .into_iter()
        .filter(|c| train.contains(c))
        .collect();
    if !overlap.is_empty() {
        return Err(ValidationError::OverlappingGlyphs(overlap));
    }

    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }
    if spec.inference.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.inference.batch_size));
    }

    let opt = &spec.optimizer;
    if opt.lr <= 0.0 || opt.lr > 1.0 || opt.lr.is_nan() {
        return Err(ValidationError::InvalidLearningRate(opt.lr));
    }
    for (name, value) in [("beta1", opt.beta1), ("beta2", opt.beta2)] {
        if !(0.0..1.0).contains(&value) {
            return Err(ValidationError::InvalidBeta { name, value });
        }
    }

    let training = &spec.training;
    if training.epochs == 0 {
        return Err(ValidationError::InvalidEpochs(training.epochs));
    }
    if training.save_interval == 0 {
        return Err(ValidationError::InvalidSaveInterval(training.save_interval));
    }
    if training.log_interval == 0 {
        return Err(ValidationError::InvalidLogInterval(training.log_interval));
    }
    if training.l1_lambda < 0.0 || training.l1_lambda.is_nan() {
        return Err(ValidationError::InvalidL1Lambda(training.l1_lambda));
    }

    let model = &spec.model;
    for (name, value) in [("ngf", model.ngf), ("ndf", model.ndf)] {
        if value == 0 {
            return Err(ValidationError::InvalidWidth { name, value });
        }
    }
    if !(GeneratorConfig::MIN_DEPTH..=GeneratorConfig::MAX_DEPTH).contains(&model.depth) {
        return Err(ValidationError::InvalidDepth(model.depth));
    }
    if model.disc_layers == 0 {
        return Err(ValidationError::InvalidDiscLayers(model.disc_layers));
    }

    let size = spec.data.image_size;
    let multiple = 1u32 << model.depth;
    if size == 0 || size % multiple != 0 {
        return Err(ValidationError::InvalidImageSize { size, multiple });
    }
    if model.discriminator_config().patch_grid(size as usize).is_none() {
        return Err(ValidationError::PatchGridVanishes {
            size,
            layers: model.disc_layers,
        });
    }

    Ok(())
}
