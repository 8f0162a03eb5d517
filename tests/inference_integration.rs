//! Glyph synthesis with a synthetic renderer

mod common;

use common::small_generator;
use glyphforge::autograd::Context;
use glyphforge::cli::LogLevel;
use glyphforge::glyph::GlyphRenderer;
use glyphforge::infer::{generate_glyphs, GenerateOptions};
use glyphforge::{Error, Result};
use image::{GrayImage, Luma};
use std::cell::RefCell;

/// Renders a gradient whose offset depends on the code point
#[derive(Default)]
struct Gradient {
    requests: RefCell<Vec<(char, u32)>>,
}

impl GlyphRenderer for Gradient {
    fn render(&self, ch: char, size: u32) -> Result<GrayImage> {
        self.requests.borrow_mut().push((ch, size));
        let offset = u32::from(ch) % 64;
        Ok(GrayImage::from_fn(size, size, |x, y| {
            Luma([((x * 8 + y * 4 + offset) % 256) as u8])
        }))
    }
}

fn options(batch_size: usize) -> GenerateOptions {
    GenerateOptions {
        image_size: 16,
        batch_size,
        log_level: LogLevel::Quiet,
    }
}

#[test]
fn test_five_glyphs_in_batches_of_two() {
    let out = tempfile::tempdir().unwrap();
    let mut generator = small_generator(&mut Context::with_seed(3));
    let renderer = Gradient::default();
    let glyphs = ['琉', '球', 'A', 'B', 'C'];

    let report =
        generate_glyphs(&mut generator, &renderer, &glyphs, out.path(), &options(2)).unwrap();

    assert_eq!(report.batches, 3);
    assert_eq!(report.files.len(), 5);
    for (ch, file) in glyphs.iter().zip(&report.files) {
        assert_eq!(file, &out.path().join(format!("{}.png", u32::from(*ch))));
        let img = image::open(file).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (16, 16));
    }
    assert_eq!(renderer.requests.borrow().len(), 5);
    assert!(renderer.requests.borrow().iter().all(|&(_, s)| s == 16));
}

#[test]
fn test_generation_is_deterministic_in_eval_mode() {
    let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let mut generator = small_generator(&mut Context::with_seed(3));
    let renderer = Gradient::default();

    let first = generate_glyphs(&mut generator, &renderer, &['A'], a.path(), &options(1)).unwrap();
    let second = generate_glyphs(&mut generator, &renderer, &['A'], b.path(), &options(4)).unwrap();

    let read = |p: &std::path::Path| image::open(p).unwrap().to_luma8().into_raw();
    assert_eq!(read(&first.files[0]), read(&second.files[0]));
}

#[test]
fn test_incompatible_resolution_is_rejected() {
    let out = tempfile::tempdir().unwrap();
    let mut generator = small_generator(&mut Context::with_seed(3));
    let opts = GenerateOptions { image_size: 24, ..options(2) };

    let err = generate_glyphs(&mut generator, &Gradient::default(), &['A'], out.path(), &opts)
        .unwrap_err();
    assert!(matches!(err, Error::Shape(_)));
}
