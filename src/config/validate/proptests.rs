//! Property-based tests for configuration validation

use super::validator::validate_values;
use crate::config::schema::*;
use proptest::prelude::*;
use std::path::PathBuf;

fn arb_valid_spec() -> impl Strategy<Value = RunSpec> {
    (
        1usize..64, // batch_size
        1e-6f32..1.0, // lr
        1usize..500, // epochs
        2usize..=8, // depth
        1usize..=3, // disc_layers
        0f32..0.99, // beta1
    )
        .prop_map(|(batch_size, lr, epochs, depth, disc_layers, beta1)| RunSpec {
            fonts: FontsSpec {
                target: PathBuf::from("t.otf"),
                reference: PathBuf::from("r.otf"),
            },
            glyphs: GlyphsSpec {
                train: GlyphSet::Text("AB".into()),
                generate: GlyphSet::CodePoints(vec![67]),
            },
            data: DataSpec { batch_size, image_size: 256, ..Default::default() },
            model: ModelSpec { depth, disc_layers, ..Default::default() },
            optimizer: OptimSpec { lr, beta1, ..Default::default() },
            training: TrainingParams { epochs, ..Default::default() },
            inference: InferenceSpec::default(),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_valid_spec_passes(spec in arb_valid_spec()) {
        prop_assert!(validate_values(&spec).is_ok());
    }

    #[test]
    fn prop_non_multiple_sizes_rejected(depth in 2usize..=8, offset in 1u32..4) {
        let mut spec = fixed_spec();
        spec.model.depth = depth;
        spec.data.image_size = 256 + offset;
        prop_assert!(validate_values(&spec).is_err());
    }
}

fn fixed_spec() -> RunSpec {
    RunSpec {
        fonts: FontsSpec {
            target: PathBuf::from("t.otf"),
            reference: PathBuf::from("r.otf"),
        },
        glyphs: GlyphsSpec {
            train: GlyphSet::Text("AB".into()),
            generate: GlyphSet::Text("C".into()),
        },
        data: DataSpec::default(),
        model: ModelSpec::default(),
        optimizer: OptimSpec::default(),
        training: TrainingParams::default(),
        inference: InferenceSpec::default(),
    }
}
