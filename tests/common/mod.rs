//! Shared fixtures for integration tests

#![allow(dead_code)]

use glyphforge::autograd::Context;
use glyphforge::nn::{DiscriminatorConfig, GeneratorConfig, PatchDiscriminator, UNetGenerator};
use image::{GrayImage, Luma};
use std::path::{Path, PathBuf};

/// Side of the synthetic glyph images
pub const SIZE: u32 = 16;

/// Write `{key}.png` filled with `value` into `dir`
pub fn write_glyph(dir: &Path, key: &str, value: u8) {
    std::fs::create_dir_all(dir).unwrap();
    GrayImage::from_pixel(SIZE, SIZE, Luma([value]))
        .save(dir.join(format!("{key}.png")))
        .unwrap();
}

/// Three constant-valued pairs keyed "65", "66", "67"
pub fn three_pairs(root: &Path) -> (PathBuf, PathBuf) {
    let source = root.join("source");
    let target = root.join("target");
    for (key, value) in [("65", 0u8), ("66", 128), ("67", 255)] {
        write_glyph(&source, key, value);
        write_glyph(&target, key, 255 - value);
    }
    (source, target)
}

pub fn small_generator(ctx: &mut Context) -> UNetGenerator {
    UNetGenerator::new(
        GeneratorConfig { in_channels: 1, out_channels: 1, ngf: 4, depth: 4 },
        ctx,
    )
    .unwrap()
}

pub fn small_discriminator(ctx: &mut Context) -> PatchDiscriminator {
    PatchDiscriminator::new(DiscriminatorConfig { in_channels: 2, ndf: 4, n_layers: 1 }, ctx)
        .unwrap()
}
