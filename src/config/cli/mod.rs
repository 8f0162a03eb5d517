//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! glyphforge render config.yaml
//! glyphforge train config.yaml --epochs 50 --checkpoint-dir ./ckpt
//! glyphforge generate config.yaml --checkpoint ./ckpt/G_epoch050.safetensors
//! glyphforge validate config.yaml
//! glyphforge info
//! ```

mod core;

pub use core::{
    apply_generate_overrides, apply_overrides, parse_args, Cli, Command, GenerateArgs, InfoArgs,
    RenderArgs, TrainArgs, ValidateArgs,
};

#[cfg(test)]
mod tests;
