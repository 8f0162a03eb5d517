//! Error types for glyphforge

use std::path::PathBuf;

use crate::config::ValidationError;

/// Result type alias for glyphforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing data, training, or generating glyphs
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration parsed but failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    /// No source image had a matching target image
    #[error(
        "Dataset is empty: no source image in {} has a partner in {}; check font paths and characters",
        .source_dir.display(),
        .target_dir.display()
    )]
    EmptyDataset {
        /// Source image directory
        source_dir: PathBuf,
        /// Target image directory
        target_dir: PathBuf,
    },

    /// Tensor or image dimensions are incompatible with the network
    #[error("Shape error: {0}")]
    Shape(String),

    /// Glyph rendering failed
    #[error("Failed to render {character:?} with {}: {reason}", .font.display())]
    Render {
        /// Font file used for rendering
        font: PathBuf,
        /// Character being rendered
        character: char,
        /// Failure description
        reason: String,
    },

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Checkpoint file does not exist
    #[error("Checkpoint not found: {}", .0.display())]
    CheckpointNotFound(PathBuf),

    /// Checkpoint exists but cannot be restored into the network
    #[error("Incompatible checkpoint {}: {reason}", .path.display())]
    Checkpoint {
        /// Checkpoint file
        path: PathBuf,
        /// Failure description
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A loss diverged to NaN or infinity
    #[error("Non-finite {what} at epoch {epoch}, batch {batch}")]
    NonFinite {
        /// Epoch (1-based)
        epoch: usize,
        /// Batch index within the epoch
        batch: usize,
        /// Which quantity diverged
        what: &'static str,
    },
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dataset_message_names_directories() {
        let err = Error::EmptyDataset {
            source_dir: PathBuf::from("data/source"),
            target_dir: PathBuf::from("data/target"),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/source"));
        assert!(msg.contains("data/target"));
    }

    #[test]
    fn test_checkpoint_not_found_names_path() {
        let err = Error::CheckpointNotFound(PathBuf::from("ckpt/G_epoch200.safetensors"));
        assert!(err.to_string().contains("G_epoch200.safetensors"));
    }

    #[test]
    fn test_render_error_shows_character() {
        let err = Error::Render {
            font: PathBuf::from("font.otf"),
            character: 'あ',
            reason: "unreadable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains('あ'));
        assert!(msg.contains("font.otf"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
