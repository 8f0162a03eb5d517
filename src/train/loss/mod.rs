//! Loss functions for adversarial image-to-image training
//!
//! - [`BCEWithLogitsLoss`] - per-patch real/fake classification of discriminator logits
//! - [`L1Loss`] - pixel reconstruction (Mean Absolute Error)

mod bce_with_logits;
mod l1;
mod traits;

pub use bce_with_logits::BCEWithLogitsLoss;
pub use l1::L1Loss;
pub use traits::LossFn;
