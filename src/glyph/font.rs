//! Outline fonts rendered through `skrifa`

use super::raster::rasterize;
use super::GlyphRenderer;
use crate::{Error, Result};
use image::GrayImage;
use kurbo::{Affine, BezPath, Rect, Shape, Vec2};
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlinePen};
use skrifa::{FontRef, GlyphId, MetadataProvider};
use std::path::{Path, PathBuf};

/// Pixels per em relative to the image side
pub const EM_FRACTION: f32 = 0.8;

/// Upward nudge of the fallback placement, relative to the image side
const FALLBACK_LIFT: f64 = 0.05;

/// Collects a skrifa outline into a `kurbo` path, still in font space (y up)
#[derive(Default)]
struct BezPathPen(BezPath);

impl OutlinePen for BezPathPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to((f64::from(x), f64::from(y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to((f64::from(x), f64::from(y)));
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.0
            .quad_to((f64::from(cx0), f64::from(cy0)), (f64::from(x), f64::from(y)));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.0.curve_to(
            (f64::from(cx0), f64::from(cy0)),
            (f64::from(cx1), f64::from(cy1)),
            (f64::from(x), f64::from(y)),
        );
    }

    fn close(&mut self) {
        self.0.close_path();
    }
}

/// Offset moving a baseline-origin outline (image space) into a `size × size` canvas
///
/// A non-degenerate bounding box is centered exactly. Otherwise the advance
/// width is centered horizontally and the ascent vertically, lifted slightly.
fn placement(bounds: Option<Rect>, size: f64, advance: f64, ascent: f64) -> Vec2 {
    match bounds {
        Some(bbox) if bbox.width() > 0.0 && bbox.height() > 0.0 => Vec2::new(
            (size - bbox.width()) / 2.0 - bbox.x0,
            (size - bbox.height()) / 2.0 - bbox.y0,
        ),
        _ => {
            let top = (size - ascent) / 2.0 - size * FALLBACK_LIFT;
            Vec2::new((size - advance) / 2.0, top + ascent)
        }
    }
}

/// Renders characters of one font file, black on white
#[derive(Debug, Clone)]
pub struct FontRenderer {
    path: PathBuf,
    data: Vec<u8>,
}

impl FontRenderer {
    /// Read and validate a TrueType/OpenType font (first face of a collection)
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)
            .map_err(|e| Error::Config(format!("cannot read font {}: {e}", path.display())))?;
        Self::from_bytes(path, data)
    }

    /// Use already loaded font bytes; `path` only labels errors
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let path = path.into();
        FontRef::from_index(&data, 0)
            .map_err(|e| Error::Config(format!("{} is not a usable font: {e}", path.display())))?;
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the font maps `ch` to a real glyph
    pub fn has_glyph(&self, ch: char) -> bool {
        FontRef::from_index(&self.data, 0)
            .ok()
            .and_then(|font| font.charmap().map(ch))
            .is_some_and(|gid| gid != GlyphId::NOTDEF)
    }

    fn render_error(&self, character: char, reason: impl ToString) -> Error {
        Error::Render {
            font: self.path.clone(),
            character,
            reason: reason.to_string(),
        }
    }
}

impl GlyphRenderer for FontRenderer {
    fn render(&self, ch: char, size: u32) -> Result<GrayImage> {
        let font = FontRef::from_index(&self.data, 0).map_err(|e| self.render_error(ch, e))?;
        // Unmapped characters fall back to .notdef, as the font itself would substitute
        let gid = font.charmap().map(ch).unwrap_or(GlyphId::NOTDEF);

        let side = size as f32;
        let em = Size::new(side * EM_FRACTION);
        let location = LocationRef::default();

        let glyph = font
            .outline_glyphs()
            .get(gid)
            .ok_or_else(|| self.render_error(ch, format!("no outline for glyph {}", gid.to_u32())))?;
        let mut pen = BezPathPen::default();
        glyph
            .draw(DrawSettings::unhinted(em, location), &mut pen)
            .map_err(|e| self.render_error(ch, e))?;
        let mut path = pen.0;
        path.apply_affine(Affine::FLIP_Y);

        let advance = font
            .glyph_metrics(em, location)
            .advance_width(gid)
            .unwrap_or(0.0);
        let ascent = font.metrics(em, location).ascent;

        let bounds = (!path.elements().is_empty()).then(|| path.bounding_box());
        let offset = placement(bounds, f64::from(side), f64::from(advance), f64::from(ascent));
        path.apply_affine(Affine::translate(offset));
        Ok(rasterize(&path, size, size))
    }
}
