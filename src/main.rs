//! Glyphforge CLI
//!
//! # Usage
//!
//! ```bash
//! # Render training pairs from both fonts
//! glyphforge render run.yaml
//!
//! # Train with overrides
//! glyphforge train run.yaml --epochs 50 --lr 0.0002
//!
//! # Synthesize the missing glyphs
//! glyphforge generate run.yaml --checkpoint checkpoints/G_epoch050.safetensors
//!
//! # Validate config / show execution context
//! glyphforge validate run.yaml --detailed
//! glyphforge info run.yaml
//! ```

use clap::Parser;
use glyphforge::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
