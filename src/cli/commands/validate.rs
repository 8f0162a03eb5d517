//! Validate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, validate_config, RunSpec, ValidateArgs};

/// Format font and glyph information as a string
pub fn format_glyph_info(spec: &RunSpec) -> String {
    let count = |set: &crate::config::GlyphSet| set.chars().map(|c| c.len()).unwrap_or(0);
    [
        format!("  Target font: {}", spec.fonts.target.display()),
        format!("  Reference font: {}", spec.fonts.reference.display()),
        format!("  Training glyphs: {}", count(&spec.glyphs.train)),
        format!("  Glyphs to generate: {}", count(&spec.glyphs.generate)),
    ]
    .join("\n")
}

/// Format data configuration as a string
pub fn format_data_info(spec: &RunSpec) -> String {
    [
        format!("  Source images: {}", spec.data.source_dir.display()),
        format!("  Target images: {}", spec.data.target_dir.display()),
        format!("  Image size: {0}x{0}", spec.data.image_size),
        format!("  Batch size: {}", spec.data.batch_size),
    ]
    .join("\n")
}

/// Format model and training configuration as a string
pub fn format_training_info(spec: &RunSpec) -> String {
    [
        format!(
            "  U-Net: depth {} ngf {}; PatchGAN: {} layers ndf {}",
            spec.model.depth, spec.model.ngf, spec.model.disc_layers, spec.model.ndf
        ),
        format!("  Epochs: {} (L1 weight {})", spec.training.epochs, spec.training.l1_lambda),
        format!(
            "  Checkpoints: every {} epochs in {}",
            spec.training.save_interval,
            spec.training.checkpoint_dir.display()
        ),
    ]
    .join("\n")
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating config: {}", args.config.display()),
    );

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "✓ Configuration is valid");

    if args.detailed {
        log(level, LogLevel::Normal, "");
        log(level, LogLevel::Normal, "Glyphs:");
        log(level, LogLevel::Normal, &format_glyph_info(&spec));
        log(level, LogLevel::Normal, "Data:");
        log(level, LogLevel::Normal, &format_data_info(&spec));
        log(level, LogLevel::Normal, "Training:");
        log(level, LogLevel::Normal, &format_training_info(&spec));
    }

    Ok(())
}
