//! Generate command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{apply_generate_overrides, load_config, validate_values, GenerateArgs};
use crate::infer::run_inference;

pub fn run_generate(args: GenerateArgs, level: LogLevel) -> Result<(), String> {
    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_generate_overrides(&mut spec, &args);
    validate_values(&spec).map_err(|e| format!("Config error: {e}"))?;

    let report = run_inference(&spec, level).map_err(|e| format!("Generation error: {e}"))?;

    log(
        level,
        LogLevel::Normal,
        &format!(
            "Wrote {} glyphs to {}",
            report.files.len(),
            spec.inference.output_dir.display()
        ),
    );
    Ok(())
}
