//! Validation error types

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{role} font does not exist: {path}")]
    FontNotFound { role: &'static str, path: String },

    #[error("The {0} glyph set is empty")]
    EmptyGlyphSet(&'static str),

    #[error("Invalid code point: {0:#x} (not a Unicode scalar value)")]
    InvalidCodePoint(u32),

    #[error("Glyphs {0} appear in both the train and generate sets")]
    OverlappingGlyphs(String),

    #[error("Invalid learning rate: {0} (must be > 0.0 and <= 1.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid {name}: {value} (must be in [0.0, 1.0))")]
    InvalidBeta { name: &'static str, value: f32 },

    #[error("Invalid L1 weight: {0} (must be >= 0.0)")]
    InvalidL1Lambda(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid epochs: {0} (must be > 0)")]
    InvalidEpochs(usize),

    #[error("Invalid save interval: {0} (must be > 0)")]
    InvalidSaveInterval(usize),

    #[error("Invalid log interval: {0} (must be > 0)")]
    InvalidLogInterval(usize),

    #[error("Invalid {name}: {value} (must be > 0)")]
    InvalidWidth { name: &'static str, value: usize },

    #[error("Invalid U-Net depth: {0} (must be in 2..=8)")]
    InvalidDepth(usize),

    #[error("Invalid discriminator layers: {0} (must be >= 1)")]
    InvalidDiscLayers(usize),

    #[error("Invalid image size: {size} (must be a positive multiple of {multiple})")]
    InvalidImageSize { size: u32, multiple: u32 },

    #[error("Image size {size} is too small for a {layers}-layer discriminator")]
    PatchGridVanishes { size: u32, layers: usize },
}
