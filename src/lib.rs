//! # glyphforge
//!
//! Paired image-to-image translation (pix2pix) for synthesizing glyphs that are
//! missing from a font.
//!
//! A reference font that covers every character supplies the source images; a
//! target font supplies the style. A U-Net generator learns to turn reference
//! glyphs into target-style glyphs against a PatchGAN discriminator, and the
//! trained generator then renders characters the target font lacks.
//!
//! ## Modules
//!
//! - [`autograd`]: tape-based automatic differentiation over `ndarray`
//! - [`nn`]: convolution layers, batch normalization, U-Net and PatchGAN
//! - [`optim`]: Adam
//! - [`train`]: losses, batches and the adversarial trainer
//! - [`data`]: paired glyph dataset and shuffled loader
//! - [`glyph`]: font outline rasterization
//! - [`io`]: SafeTensors checkpoints
//! - [`infer`]: glyph synthesis with a trained generator
//! - [`config`]: YAML run specification and CLI arguments
//! - [`cli`]: command handlers

pub mod autograd;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod glyph;
pub mod infer;
pub mod io;
pub mod nn;
pub mod optim;
pub mod train;

pub use autograd::Tensor;
pub use error::{Error, Result};
