use super::*;
use crate::config::schema::*;
use std::path::PathBuf;

fn spec() -> RunSpec {
    serde_yaml::from_str(
        "fonts: { target: t.otf, reference: r.otf }\nglyphs: { train: AB }\n",
    )
    .unwrap()
}

#[test]
fn test_parse_train_command() {
    let cli = parse_args(["glyphforge", "train", "config.yaml"]).unwrap();
    match cli.command {
        Command::Train(args) => {
            assert_eq!(args.config, PathBuf::from("config.yaml"));
            assert!(!args.dry_run);
            assert!(!args.skip_render);
        }
        _ => panic!("Expected Train command"),
    }
}

#[test]
fn test_parse_train_with_overrides() {
    let cli = parse_args([
        "glyphforge",
        "train",
        "config.yaml",
        "--epochs",
        "10",
        "--batch-size",
        "2",
        "--lr",
        "0.001",
        "--l1-lambda",
        "50",
        "--save-every",
        "5",
        "--checkpoint-dir",
        "ckpt",
        "--seed",
        "7",
    ])
    .unwrap();
    let Command::Train(args) = cli.command else {
        panic!("Expected Train command");
    };

    let mut spec = spec();
    apply_overrides(&mut spec, &args);
    assert_eq!(spec.training.epochs, 10);
    assert_eq!(spec.data.batch_size, 2);
    assert_eq!(spec.optimizer.lr, 0.001);
    assert_eq!(spec.training.l1_lambda, 50.0);
    assert_eq!(spec.training.save_interval, 5);
    assert_eq!(spec.training.checkpoint_dir, PathBuf::from("ckpt"));
    assert_eq!(spec.training.seed, 7);
}

#[test]
fn test_generate_overrides() {
    let cli = parse_args([
        "glyphforge",
        "generate",
        "config.yaml",
        "--checkpoint",
        "G_epoch010.safetensors",
        "-o",
        "out",
    ])
    .unwrap();
    let Command::Generate(args) = cli.command else {
        panic!("Expected Generate command");
    };
    let mut spec = spec();
    apply_generate_overrides(&mut spec, &args);
    assert_eq!(spec.inference.checkpoint, Some(PathBuf::from("G_epoch010.safetensors")));
    assert_eq!(spec.inference.output_dir, PathBuf::from("out"));
    assert_eq!(spec.inference.batch_size, 4);
}

#[test]
fn test_global_flags() {
    let cli = parse_args(["glyphforge", "-q", "info"]).unwrap();
    assert!(cli.quiet);
    assert_eq!(cli.command, Command::Info(InfoArgs { config: None }));

    let cli = parse_args(["glyphforge", "validate", "c.yaml", "--verbose"]).unwrap();
    assert!(cli.verbose);
}

#[test]
fn test_missing_config_is_parse_error() {
    assert!(parse_args(["glyphforge", "train"]).is_err());
}
