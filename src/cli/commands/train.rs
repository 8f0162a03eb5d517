//! Train command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_overrides, load_config, validate_config, TrainArgs};
use crate::train::train_from_spec;

pub fn run_train(args: TrainArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Glyphforge: Training from {}", args.config.display()),
    );

    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Config error: {e}"))?;

    if args.dry_run {
        log(
            level,
            LogLevel::Normal,
            "Dry run - config validated successfully",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  Model: ngf={} ndf={} depth={} disc_layers={}",
                spec.model.ngf, spec.model.ndf, spec.model.depth, spec.model.disc_layers
            ),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  Optimizer: adam (lr={}, betas=({}, {}))",
                spec.optimizer.lr, spec.optimizer.beta1, spec.optimizer.beta2
            ),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Epochs: {}", spec.training.epochs),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Batch size: {}", spec.data.batch_size),
        );
        return Ok(());
    }

    let report = train_from_spec(&spec, !args.skip_render, level)
        .map_err(|e| format!("Training error: {e}"))?;

    for path in report.checkpoints() {
        log(level, LogLevel::Verbose, &format!("  Checkpoint: {}", path.display()));
    }
    log(
        level,
        LogLevel::Normal,
        &format!(
            "Training complete! {} discriminator / {} generator steps in {:.1}s",
            report.discriminator_steps, report.generator_steps, report.elapsed_secs
        ),
    );
    Ok(())
}
