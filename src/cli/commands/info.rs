//! Info command implementation

use crate::autograd::Context;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{load_config, InfoArgs, RunSpec};
use crate::nn::{stage_plan, Module, PatchDiscriminator, UNetGenerator};

/// Describe the execution context
pub fn format_context_info(ctx: &Context) -> String {
    [
        format!("glyphforge {}", env!("CARGO_PKG_VERSION")),
        format!("  Device: {}", ctx.device()),
        format!("  Kernel threads: {}", rayon::current_num_threads()),
    ]
    .join("\n")
}

/// Describe the networks a spec builds
pub fn format_network_info(spec: &RunSpec, ctx: &mut Context) -> Result<String, String> {
    let g_config = spec.model.generator_config();
    let d_config = spec.model.discriminator_config();
    let generator = UNetGenerator::new(g_config, ctx).map_err(|e| e.to_string())?;
    let discriminator = PatchDiscriminator::new(d_config, ctx).map_err(|e| e.to_string())?;

    let (encoder, decoder) = stage_plan(&g_config);
    let widths: Vec<String> = encoder.iter().map(|s| s.out_channels.to_string()).collect();
    let grid = d_config
        .patch_grid(spec.data.image_size as usize)
        .map_or_else(|| "none".to_string(), |g| format!("{g}x{g}"));

    Ok([
        format!(
            "  Generator: {} encoder / {} decoder stages, widths [{}], {} parameters",
            encoder.len(),
            decoder.len(),
            widths.join(", "),
            generator.num_parameters()
        ),
        format!(
            "  Discriminator: {} strided layers, {} logit grid, {} parameters",
            d_config.n_layers,
            grid,
            discriminator.num_parameters()
        ),
    ]
    .join("\n"))
}

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let mut ctx = Context::with_seed(0);
    log(level, LogLevel::Normal, &format_context_info(&ctx));

    if let Some(path) = &args.config {
        let spec = load_config(path).map_err(|e| format!("Config error: {e}"))?;
        log(level, LogLevel::Normal, &format!("Configuration {}:", path.display()));
        log(level, LogLevel::Normal, &format_network_info(&spec, &mut ctx)?);
    }
    Ok(())
}
