//! Tape-based autograd engine
//!
//! Provides automatic differentiation over NCHW `f32` tensors using a
//! computational graph recorded as ops execute.
//!
//! ```ignore
//! use glyphforge::autograd::{backward, conv2d, ConvGeometry, Tensor};
//!
//! let y = conv2d(&x, &weight, None, ConvGeometry::new(4, 2, 1));
//! backward(&y, None);
//! ```

mod backward;
mod context;
mod ops;
mod tensor;

#[cfg(test)]
mod tests;

pub use backward::{backward, is_grad_enabled, no_grad, BackwardOp};
pub use context::{Context, Device};
pub use ops::*;
pub use tensor::{GradCell, Tensor};
