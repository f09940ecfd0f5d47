#![allow(dead_code)]

use stylenet::data::{DataLoader, DatasetSource, InMemoryLoader, Sample, Split};
use stylenet::error::Result;
use stylenet::Tensor;

/// Constant-colour images; class `i % classes`.
pub fn samples(n: usize, size: usize, classes: usize, with_targets: bool) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let image = Tensor::full(&[3, size, size], (i % classes) as f64 / classes as f64);
            Sample {
                target_image: with_targets.then(|| image.clone()),
                image,
                target: i % classes,
            }
        })
        .collect()
}

/// Serves the same in-memory samples for every dataset name and split.
pub struct StubSource {
    pub size: usize,
    pub classes: usize,
    pub count: usize,
}

impl DatasetSource for StubSource {
    fn loader(&self, _dataset_name: &str, _split: Split) -> Result<Box<dyn DataLoader>> {
        Ok(Box::new(InMemoryLoader::new(samples(self.count, self.size, self.classes, false), 4, false)))
    }

    fn pair_loader(&self, _dataset_name: &str, _split: Split) -> Result<Box<dyn DataLoader>> {
        Ok(Box::new(InMemoryLoader::new(samples(self.count, self.size, self.classes, true), 4, false)))
    }
}
