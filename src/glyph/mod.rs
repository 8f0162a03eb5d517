//! Glyph rasterization
//!
//! A [`GlyphRenderer`] turns a character into a square grayscale image. Training
//! pairs and inference inputs are both produced through this trait, so tests
//! can substitute a synthetic renderer for a real font.

mod font;
mod raster;

pub use font::{FontRenderer, EM_FRACTION};
pub use raster::{FLATTEN_TOLERANCE, SUPERSAMPLE};

use crate::Result;
use image::GrayImage;
use std::path::Path;

/// Renders one character into a `size × size` grayscale image (white background)
pub trait GlyphRenderer {
    fn render(&self, ch: char, size: u32) -> Result<GrayImage>;
}

/// File-name key of a character: its decimal code point (`'A'` → `"65"`)
pub fn glyph_key(ch: char) -> String {
    u32::from(ch).to_string()
}

/// Write `{key}.png` renderings of every glyph with both fonts
///
/// `reference` output goes to `source_dir`, `target` output to `target_dir`.
/// Returns the number of pairs written.
pub fn render_training_pairs(
    reference: &dyn GlyphRenderer,
    target: &dyn GlyphRenderer,
    glyphs: &[char],
    source_dir: &Path,
    target_dir: &Path,
    size: u32,
) -> Result<usize> {
    std::fs::create_dir_all(source_dir)?;
    std::fs::create_dir_all(target_dir)?;

    for &ch in glyphs {
        let name = format!("{}.png", glyph_key(ch));
        reference.render(ch, size)?.save(source_dir.join(&name))?;
        target.render(ch, size)?.save(target_dir.join(&name))?;
    }
    Ok(glyphs.len())
}
