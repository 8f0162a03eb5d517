//! Batch data structure

use crate::{Error, Result, Tensor};
use ndarray::{stack, Array3, Axis};

/// A training batch of aligned (source, target) glyph images
///
/// Batches are assembled once by the loader and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct Batch {
    /// Source images `[N, 1, H, W]` in [-1, 1]
    pub source: Tensor,
    /// Target images `[N, 1, H, W]` in [-1, 1]
    pub target: Tensor,
    /// Sample keys (file stems, code points) in batch order
    pub keys: Vec<String>,
}

impl Batch {
    /// Create a new batch
    pub fn new(source: Tensor, target: Tensor, keys: Vec<String>) -> Self {
        Self { source, target, keys }
    }

    /// Stack per-sample `[1, H, W]` images into a batch
    pub fn from_samples(samples: Vec<(String, Array3<f32>, Array3<f32>)>) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::Shape("cannot assemble an empty batch".into()));
        }
        let mut keys = Vec::with_capacity(samples.len());
        let mut sources = Vec::with_capacity(samples.len());
        let mut targets = Vec::with_capacity(samples.len());
        for (key, source, target) in &samples {
            keys.push(key.clone());
            sources.push(source.view());
            targets.push(target.view());
        }

        let stack_all = |views: &[ndarray::ArrayView3<'_, f32>]| {
            stack(Axis(0), views).map_err(|e| {
                Error::Shape(format!("batch images differ in size ({e}); keys {keys:?}"))
            })
        };
        let source = stack_all(&sources)?;
        let target = stack_all(&targets)?;

        Ok(Self::new(
            Tensor::new(source.into_dyn(), false),
            Tensor::new(target.into_dyn(), false),
            keys.clone(),
        ))
    }

    /// Number of samples
    pub fn size(&self) -> usize {
        self.keys.len()
    }
}
