use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    error::{HarnessError, Result},
    util::image::{load_rgb, rgb_to_tensor},
};
use super::{
    batch::{Batch, Sample},
    loader::DataLoader,
    transforms::Transform,
};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Images stored as `<root>/<class_name>/<file>`; classes are indexed in
/// sorted folder-name order.
#[derive(Debug, Clone)]
pub struct ImageFolderDataset {
    pub root: PathBuf,
    pub classes: Vec<String>,
    /// Path relative to `root`, and class index.
    pub items: Vec<(PathBuf, usize)>,
}

impl ImageFolderDataset {
    pub fn open(root: &Path) -> Result<ImageFolderDataset> {
        if !root.is_dir() {
            return Err(HarnessError::MissingDataset(root.to_path_buf()));
        }

        let mut classes: Vec<String> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        classes.sort();
        if classes.is_empty() {
            return Err(HarnessError::MissingDataset(root.to_path_buf()));
        }

        let mut items = Vec::new();
        for (index, class) in classes.iter().enumerate() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(root.join(class))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| is_image(path))
                .collect();
            files.sort();
            items.extend(files.into_iter().map(|path| (PathBuf::from(class).join(
                path.file_name().unwrap_or_default(),
            ), index)));
        }

        Ok(ImageFolderDataset { root: root.to_path_buf(), classes, items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decodes an [`ImageFolderDataset`] batch by batch.
///
/// With `targets` set every sample also carries a reconstruction target:
/// the same relative path under `pair_root` when given, else the input
/// image itself, in both cases un-normalised and without augmentation.
pub struct ImageFolderLoader {
    pub dataset: ImageFolderDataset,
    pub transform: Transform,
    pub batch_size: usize,
    pub shuffle: bool,
    pub targets: Option<PairTargets>,
    pool: ThreadPool,
}

#[derive(Debug, Clone)]
pub struct PairTargets {
    pub pair_root: Option<PathBuf>,
}

impl ImageFolderLoader {
    /// Decoding runs on a dedicated pool of `num_workers` threads.
    pub fn new(
        dataset: ImageFolderDataset,
        transform: Transform,
        batch_size: usize,
        num_workers: usize,
        shuffle: bool,
        targets: Option<PairTargets>,
    ) -> Result<ImageFolderLoader> {
        if batch_size == 0 {
            return Err(HarnessError::InvalidBatchSize);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .thread_name(|i| format!("decode-{i}"))
            .build()?;
        Ok(ImageFolderLoader { dataset, transform, batch_size, shuffle, targets, pool })
    }

    fn load_sample(&self, index: usize) -> Result<Sample> {
        let (relative, target) = &self.dataset.items[index];
        let img = load_rgb(&self.dataset.root.join(relative))?;
        let mut rng = rand::thread_rng();

        let Some(pair) = &self.targets else {
            return Ok(Sample {
                image: self.transform.apply(&img, &mut rng),
                target: *target,
                target_image: None,
            });
        };

        let geometry = Transform::eval(self.transform.size);
        let input = geometry.geometry(&img, &mut rng);
        let target_rgb = match &pair.pair_root {
            Some(root) => geometry.geometry(&load_rgb(&root.join(relative))?, &mut rng),
            None => input.clone(),
        };
        Ok(Sample {
            image: super::transforms::normalize(rgb_to_tensor(&input)),
            target: *target,
            target_image: Some(rgb_to_tensor(&target_rgb)),
        })
    }

    fn load_batch(&self, indices: &[usize]) -> Result<Batch> {
        let samples = self
            .pool
            .install(|| indices.par_iter().map(|&i| self.load_sample(i)).collect::<Result<Vec<_>>>())?;
        Ok(Batch::collate(&samples))
    }
}

impl DataLoader for ImageFolderLoader {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn num_workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn dataset_len(&self) -> usize {
        self.dataset.len()
    }

    fn batches(&self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut rand::thread_rng());
        }
        let chunks: Vec<Vec<usize>> = order.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        Box::new(chunks.into_iter().map(move |chunk| self.load_batch(&chunk)))
    }
}
