//! Paired glyph image data
//!
//! [`PairedDataset`] indexes matched source/target PNGs, [`DataLoader`] turns it
//! into shuffled [`Batch`](crate::train::Batch)es, and [`transform`] holds the
//! pixel normalization shared with inference.

mod dataset;
mod loader;
pub mod transform;

pub use dataset::{PairedDataset, Sample, SkipReason, SkippedPair};
pub use loader::{Batches, DataLoader};
pub use transform::{denormalize, normalize};
