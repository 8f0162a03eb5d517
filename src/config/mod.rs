//! Declarative run configuration
//!
//! A YAML [`RunSpec`] describes fonts, glyph sets, data layout, architecture,
//! and hyperparameters. The [`cli`] module parses command-line arguments and
//! applies their overrides on top of a loaded spec.

pub mod cli;
mod schema;
mod validate;

pub use cli::{
    apply_generate_overrides, apply_overrides, parse_args, Cli, Command, GenerateArgs, InfoArgs,
    RenderArgs, TrainArgs, ValidateArgs,
};
pub use schema::{
    DataSpec, FontsSpec, GlyphSet, GlyphsSpec, InferenceSpec, ModelSpec, OptimSpec, RunSpec,
    TrainingParams,
};
pub use validate::{validate_config, validate_fonts, validate_values, ValidationError};

use crate::{Error, Result};
use std::path::Path;

/// Read and parse a YAML run specification
pub fn load_config(path: impl AsRef<Path>) -> Result<RunSpec> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_yaml::from_str(&yaml)
        .map_err(|e| Error::Config(format!("Failed to parse YAML config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "fonts:\n  target: t.otf\n  reference: r.otf\nglyphs:\n  train: [65, 66]\nmodel:\n  depth: 4\n",
        )
        .unwrap();

        let spec = load_config(&path).unwrap();
        assert_eq!(spec.model.depth, 4);
        assert_eq!(spec.model.ngf, 64);
        assert_eq!(spec.glyphs.train.chars().unwrap(), vec!['A', 'B']);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/run.yaml").unwrap_err();
        assert!(err.to_string().contains("run.yaml"));
    }

    #[test]
    fn test_load_config_rejects_missing_fonts_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "glyphs:\n  train: AB\n").unwrap();
        assert!(matches!(load_config(&path), Err(Error::Config(_))));
    }
}
