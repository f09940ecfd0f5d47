use rand::seq::SliceRandom;

use crate::error::Result;
use super::batch::{Batch, Sample};

/// Source of finite, re-iterable mini-batch sequences.
pub trait DataLoader {
    fn batch_size(&self) -> usize;

    fn num_workers(&self) -> usize;

    /// Number of samples in the underlying dataset.
    fn dataset_len(&self) -> usize;

    /// Number of batches one pass yields (the last may be partial).
    fn len(&self) -> usize {
        self.dataset_len().div_ceil(self.batch_size().max(1))
    }

    fn is_empty(&self) -> bool {
        self.dataset_len() == 0
    }

    /// One pass over the dataset. Shuffling loaders reshuffle per call.
    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;
}

/// Loader over samples already held in memory.
pub struct InMemoryLoader {
    samples: Vec<Sample>,
    batch_size: usize,
    shuffle: bool,
}

impl InMemoryLoader {
    pub fn new(samples: Vec<Sample>, batch_size: usize, shuffle: bool) -> InMemoryLoader {
        assert!(batch_size > 0, "batch_size must be at least 1");
        InMemoryLoader { samples, batch_size, shuffle }
    }
}

impl DataLoader for InMemoryLoader {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn num_workers(&self) -> usize {
        0
    }

    fn dataset_len(&self) -> usize {
        self.samples.len()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let mut indices: Vec<usize> = (0..self.samples.len()).collect();
        if self.shuffle {
            indices.shuffle(&mut rand::thread_rng());
        }
        let batches: Vec<Vec<usize>> = indices.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        Box::new(batches.into_iter().map(move |chunk| {
            let samples: Vec<Sample> = chunk.iter().map(|&i| self.samples[i].clone()).collect();
            Ok(Batch::collate(&samples))
        }))
    }
}
