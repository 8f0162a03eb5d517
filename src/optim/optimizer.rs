//! Optimizer trait

use crate::Tensor;

/// Trait for optimizers
///
/// Parameters are shared tensor handles, so an update through `&[Tensor]`
/// is visible to the network that owns them.
pub trait Optimizer {
    /// Perform a single optimization step over every parameter with a gradient
    fn step(&mut self, params: &[Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &[Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
