//! CLI command tests

use super::*;
use crate::cli::LogLevel;
use crate::config::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a config whose font files exist (contents are irrelevant to validation)
fn create_test_config(dir: &TempDir, extra: &str) -> PathBuf {
    let config_path = dir.path().join("run.yaml");
    let target = dir.path().join("target.otf");
    let reference = dir.path().join("reference.otf");
    std::fs::write(&target, b"dummy").unwrap();
    std::fs::write(&reference, b"dummy").unwrap();

    let config = format!(
        r#"
fonts:
  target: {}
  reference: {}
glyphs:
  train: "ABC"
  generate: "D"
data:
  source_dir: {}
  target_dir: {}
  image_size: 16
  batch_size: 1
model:
  ngf: 4
  ndf: 4
  depth: 4
  disc_layers: 1
training:
  epochs: 1
  checkpoint_dir: {}
{extra}"#,
        target.display(),
        reference.display(),
        dir.path().join("source").display(),
        dir.path().join("target").display(),
        dir.path().join("ckpt").display(),
    );

    std::fs::write(&config_path, config).unwrap();
    config_path
}

#[test]
fn test_validate_command_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "");
    let result = validate::run_validate(
        ValidateArgs { config, detailed: true },
        LogLevel::Quiet,
    );
    assert!(result.is_ok());
}

#[test]
fn test_validate_command_reports_bad_values() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "optimizer:\n  lr: 5.0\n");
    let err = validate::run_validate(ValidateArgs { config, detailed: false }, LogLevel::Quiet)
        .unwrap_err();
    assert!(err.contains("learning rate"));
}

#[test]
fn test_train_dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "");
    let cli = parse_args(["glyphforge", "-q", "train", config.to_str().unwrap(), "--dry-run"])
        .unwrap();
    assert!(run_command(cli).is_ok());
    assert!(!dir.path().join("ckpt").exists());
    assert!(!dir.path().join("source").exists());
}

#[test]
fn test_train_without_pairs_reports_empty_dataset() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "");
    std::fs::create_dir_all(dir.path().join("source")).unwrap();
    std::fs::create_dir_all(dir.path().join("target")).unwrap();
    let cli = parse_args([
        "glyphforge",
        "-q",
        "train",
        config.to_str().unwrap(),
        "--skip-render",
    ])
    .unwrap();
    let err = run_command(cli).unwrap_err();
    assert!(err.contains("Dataset is empty"));
}

#[test]
fn test_generate_missing_checkpoint_names_path() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "");
    let err = generate::run_generate(
        GenerateArgs {
            config,
            checkpoint: Some(dir.path().join("G_epoch999.safetensors")),
            output_dir: None,
            batch_size: None,
        },
        LogLevel::Quiet,
    )
    .unwrap_err();
    assert!(err.contains("Checkpoint not found"));
    assert!(err.contains("G_epoch999.safetensors"));
}

#[test]
fn test_info_without_config() {
    assert!(info::run_info(InfoArgs { config: None }, LogLevel::Quiet).is_ok());
}

#[test]
fn test_network_info_mentions_grid() {
    let dir = TempDir::new().unwrap();
    let spec = load_config(create_test_config(&dir, "")).unwrap();
    let text = info::format_network_info(&spec, &mut crate::autograd::Context::with_seed(0))
        .unwrap();
    assert!(text.contains("6x6"));
    assert!(text.contains("widths [4, 8, 16, 32]"));
}

#[test]
fn test_render_command_rejects_fake_fonts() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "");
    let err = render::run_render(RenderArgs { config }, LogLevel::Quiet).unwrap_err();
    assert!(err.starts_with("Render error"));
}
