//! Glyph synthesis with a trained generator
//!
//! Source glyphs are rendered with the reference font, translated by the
//! generator in evaluation mode, and written as `{key}.png`.

use crate::autograd::{no_grad, Context, Tensor};
use crate::cli::{log, LogLevel};
use crate::config::RunSpec;
use crate::data::transform::{array_to_image, image_to_array};
use crate::glyph::{glyph_key, FontRenderer, GlyphRenderer};
use crate::io::{checkpoint_path, load_checkpoint, NetworkKind};
use crate::nn::{Module, UNetGenerator};
use crate::{Error, Result};
use ndarray::{Array3, Axis, Ix2};
use std::path::{Path, PathBuf};

/// Settings of one synthesis run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Side length of rendered inputs and generated outputs
    pub image_size: u32,
    /// Glyphs per forward pass
    pub batch_size: usize,
    pub log_level: LogLevel,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            image_size: 256,
            batch_size: 4,
            log_level: LogLevel::Normal,
        }
    }
}

/// Outcome of a synthesis run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Forward passes run
    pub batches: usize,
    /// Images written, in glyph order
    pub files: Vec<PathBuf>,
}

/// Translate every glyph in `glyphs` and write the results to `out_dir`
///
/// The generator is switched to evaluation mode and run without building a graph.
pub fn generate_glyphs(
    generator: &mut UNetGenerator,
    renderer: &dyn GlyphRenderer,
    glyphs: &[char],
    out_dir: &Path,
    options: &GenerateOptions,
) -> Result<GenerationReport> {
    if options.batch_size == 0 {
        return Err(Error::Config("inference batch size must be positive".into()));
    }
    std::fs::create_dir_all(out_dir)?;
    generator.set_training(false);

    let size = options.image_size as usize;
    generator.config().check_resolution(size, size)?;

    let total = glyphs.len().div_ceil(options.batch_size);
    let mut report = GenerationReport::default();

    for (i, chunk) in glyphs.chunks(options.batch_size).enumerate() {
        let inputs = chunk
            .iter()
            .map(|&ch| Ok(image_to_array(&renderer.render(ch, options.image_size)?)))
            .collect::<Result<Vec<Array3<f32>>>>()?;
        let views: Vec<_> = inputs.iter().map(Array3::view).collect();
        let stacked = ndarray::stack(Axis(0), &views)
            .map_err(|e| Error::Shape(format!("rendered glyphs differ in size: {e}")))?;

        let source = Tensor::new(stacked.into_dyn(), false);
        let output = no_grad(|| generator.try_forward(&source))?;

        let data = output.data();
        for (&ch, sample) in chunk.iter().zip(data.axis_iter(Axis(0))) {
            let path = out_dir.join(format!("{}.png", glyph_key(ch)));
            let plane = sample
                .index_axis(Axis(0), 0)
                .into_dimensionality::<Ix2>()
                .map_err(|e| Error::Shape(format!("generator output is not NCHW: {e}")))?;
            array_to_image(plane).save(&path)?;
            report.files.push(path);
        }
        report.batches += 1;

        log(
            options.log_level,
            LogLevel::Normal,
            &format!("Generated batch {}/{total}", i + 1),
        );
    }

    Ok(report)
}

/// Glyphs the reference font has no mapping for; they render as `.notdef`
pub fn unmapped_glyphs(font: &FontRenderer, glyphs: &[char]) -> Vec<char> {
    glyphs.iter().copied().filter(|&ch| !font.has_glyph(ch)).collect()
}

/// Load the configured generator checkpoint and synthesize the `generate` glyph set
///
/// Without an explicit checkpoint, the final-epoch generator in the checkpoint
/// directory is used.
pub fn run_inference(spec: &RunSpec, log_level: LogLevel) -> Result<GenerationReport> {
    let glyphs = spec.glyphs.generate.chars()?;

    let checkpoint = spec.inference.checkpoint.clone().unwrap_or_else(|| {
        checkpoint_path(
            &spec.training.checkpoint_dir,
            NetworkKind::Generator,
            spec.training.epochs,
        )
    });

    if !checkpoint.exists() {
        return Err(Error::CheckpointNotFound(checkpoint));
    }

    let mut ctx = Context::with_seed(spec.training.seed);
    ctx.eval();
    let mut generator = UNetGenerator::new(spec.model.generator_config(), &mut ctx)?;
    let metadata = load_checkpoint(&generator, &checkpoint)?;
    if let Some(meta) = metadata.filter(|m| m.network != NetworkKind::Generator) {
        return Err(Error::Checkpoint {
            path: checkpoint,
            reason: format!("holds a {} network, expected G", meta.network),
        });
    }
    log(
        log_level,
        LogLevel::Verbose,
        &format!("Loaded generator from {}", checkpoint.display()),
    );

    let renderer = FontRenderer::new(&spec.fonts.reference)?;
    for ch in unmapped_glyphs(&renderer, &glyphs) {
        eprintln!(
            "Warning: {} has no glyph for '{ch}' (U+{:04X}); its .notdef will be translated",
            renderer.path().display(),
            u32::from(ch)
        );
    }
    let options = GenerateOptions {
        image_size: spec.data.image_size,
        batch_size: spec.inference.batch_size,
        log_level,
    };
    generate_glyphs(
        &mut generator,
        &renderer,
        &glyphs,
        &spec.inference.output_dir,
        &options,
    )
}
