//! Render command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, validate_config, RenderArgs};
use crate::train::prepare_training_pairs;

pub fn run_render(args: RenderArgs, level: LogLevel) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    validate_config(&spec).map_err(|e| format!("Config error: {e}"))?;

    let written = prepare_training_pairs(&spec).map_err(|e| format!("Render error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Rendered {written} pairs into {} and {}",
            spec.data.source_dir.display(),
            spec.data.target_dir.display()
        ),
    );
    Ok(())
}
