//! Optimizers for training neural networks

mod adam;
mod optimizer;

pub use adam::Adam;
pub use optimizer::Optimizer;
