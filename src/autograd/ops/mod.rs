//! Autograd operations with backward passes
//!
//! This module provides the differentiable operations the image-to-image
//! networks are built from.

mod activations;
mod basic;
mod conv;
mod normalize;
mod shape;

// Re-export all public operations
pub use activations::{leaky_relu, relu, tanh};
pub use basic::{add, scale};
pub use conv::{conv2d, conv_transpose2d, ConvGeometry};
pub use normalize::{batch_norm2d, batch_norm2d_frozen, BatchStats};
pub use shape::concat_channels;
