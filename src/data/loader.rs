//! Shuffled mini-batch iteration over a [`PairedDataset`]

use super::dataset::{PairedDataset, Sample};
use crate::train::Batch;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Mini-batch loader
///
/// With more than one worker, the images of each batch are decoded in parallel
/// on a dedicated thread pool. Workers only read files; the finished batch is
/// assembled on the calling thread.
pub struct DataLoader {
    dataset: PairedDataset,
    batch_size: usize,
    shuffle: bool,
    pool: Option<ThreadPool>,
}

impl DataLoader {
    pub fn new(dataset: PairedDataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle: false,
            pool: None,
        }
    }

    /// Shuffle the pair order at the start of every epoch
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Decode with `num_workers` threads (0 or 1 decodes inline)
    pub fn with_num_workers(mut self, num_workers: usize) -> Result<Self> {
        self.pool = if num_workers > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("glyphforge-loader-{i}"))
                .build()
                .map_err(|e| Error::Config(format!("failed to start data workers: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(self)
    }

    pub fn dataset(&self) -> &PairedDataset {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    /// Batches per epoch; the last one may be smaller
    pub fn num_batches(&self) -> usize {
        if self.batch_size == 0 {
            0
        } else {
            self.dataset.len().div_ceil(self.batch_size)
        }
    }

    /// Iterate one epoch, drawing the shuffle order from `rng`
    pub fn epoch(&self, rng: &mut StdRng) -> Result<Batches<'_>> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".into()));
        }
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        Ok(Batches {
            loader: self,
            order,
            position: 0,
        })
    }

    fn load(&self, indices: &[usize]) -> Result<Vec<Sample>> {
        match &self.pool {
            Some(pool) => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.dataset.get(i))
                    .collect::<Result<Vec<_>>>()
            }),
            None => indices.iter().map(|&i| self.dataset.get(i)).collect(),
        }
    }
}

/// Lazily decoded batches of one epoch
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    position: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.order.len() {
            return None;
        }
        let end = (self.position + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.position..end];
        self.position = end;
        Some(
            self.loader
                .load(indices)
                .and_then(Batch::from_samples),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.position).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}
