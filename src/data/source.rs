use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use super::{
    image_folder::{ImageFolderDataset, ImageFolderLoader, PairTargets},
    loader::DataLoader,
    transforms::Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

/// Builds loaders for named dataset variants.
pub trait DatasetSource {
    /// Classification loader: images and class labels.
    fn loader(&self, dataset_name: &str, split: Split) -> Result<Box<dyn DataLoader>>;

    /// Autoencoder loader: batches also carry reconstruction targets.
    fn pair_loader(&self, dataset_name: &str, split: Split) -> Result<Box<dyn DataLoader>>;
}

/// Datasets on disk at `<root>/datasets/<dataset_name>/<split>/<class>/<image>`.
#[derive(Debug, Clone)]
pub struct ImageFolderSource {
    pub root: PathBuf,
    pub input_size: u32,
    pub batch_size: usize,
    pub num_workers: usize,
    /// Dataset whose images serve as reconstruction targets for pair loaders.
    pub pair_target: Option<String>,
}

impl ImageFolderSource {
    fn split_dir(&self, dataset_name: &str, split: Split) -> PathBuf {
        self.root.join("datasets").join(dataset_name).join(split.as_str())
    }

    pub fn num_classes(&self, dataset_name: &str) -> Result<usize> {
        Ok(ImageFolderDataset::open(&self.split_dir(dataset_name, Split::Train))?.classes.len())
    }

    fn build(&self, dataset_name: &str, split: Split, targets: Option<PairTargets>) -> Result<Box<dyn DataLoader>> {
        let dataset = ImageFolderDataset::open(&self.split_dir(dataset_name, split))?;
        let transform = match split {
            Split::Train => Transform::train(self.input_size),
            Split::Val => Transform::eval(self.input_size),
        };
        let loader = ImageFolderLoader::new(
            dataset,
            transform,
            self.batch_size,
            self.num_workers,
            split == Split::Train,
            targets,
        )?;
        info!(
            "{} dataset {} has {} datapoints in {} batches",
            split.as_str(),
            dataset_name,
            loader.dataset_len(),
            loader.len()
        );
        Ok(Box::new(loader))
    }
}

impl DatasetSource for ImageFolderSource {
    fn loader(&self, dataset_name: &str, split: Split) -> Result<Box<dyn DataLoader>> {
        self.build(dataset_name, split, None)
    }

    fn pair_loader(&self, dataset_name: &str, split: Split) -> Result<Box<dyn DataLoader>> {
        let pair_root = self
            .pair_target
            .as_deref()
            .map(|target| self.split_dir(target, split));
        self.build(dataset_name, split, Some(PairTargets { pair_root }))
    }
}
