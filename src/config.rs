use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::ImageFolderSource;
use crate::error::Result;
use crate::models::CatalogOptions;
use crate::train::{LoopOptions, PerfOptions, RunConfig};

/// Dataset variants every trained model is re-evaluated on, from fully
/// stylised to the original images.
pub const DEFAULT_DATASET_NAMES: [&str; 12] = [
    "stylized-miniimagenet-1.0",
    "stylized-miniimagenet-0.9",
    "stylized-miniimagenet-0.8",
    "stylized-miniimagenet-0.7",
    "stylized-miniimagenet-0.6",
    "stylized-miniimagenet-0.5",
    "stylized-miniimagenet-0.4",
    "stylized-miniimagenet-0.3",
    "stylized-miniimagenet-0.2",
    "stylized-miniimagenet-0.1",
    "stylized-miniimagenet-0.0",
    "miniimagenet",
];

/// Everything one invocation of the harness needs.
///
/// Loadable from JSON; absent keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Holds `datasets/` and receives `models/`.
    pub root_path: PathBuf,
    pub input_size: u32,
    pub batch_size: usize,
    pub num_workers: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub autoencoder_learning_rate: f64,
    /// Applied to models with the similarity capability.
    pub similarity_weight: f64,
    pub train_autoencoder: bool,
    /// Catalog entries to use; empty means all of them.
    pub models: Vec<String>,
    pub train_dataset: String,
    /// Dataset whose images are the reconstruction targets of pair
    /// loaders; `None` reconstructs the input itself.
    pub pair_target: Option<String>,
    pub dataset_names: Vec<String>,
    pub base_width: usize,
    pub z_size: usize,
    pub images_directory: PathBuf,
    pub only_existing: bool,
    pub debug: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            root_path: PathBuf::from("."),
            input_size: 64,
            batch_size: 32,
            num_workers: 4,
            epochs: 30,
            learning_rate: 0.01,
            autoencoder_learning_rate: 1e-3,
            similarity_weight: 0.04,
            train_autoencoder: true,
            models: Vec::new(),
            train_dataset: "miniimagenet".to_string(),
            pair_target: None,
            dataset_names: DEFAULT_DATASET_NAMES.iter().map(|s| s.to_string()).collect(),
            base_width: 8,
            z_size: 32,
            images_directory: PathBuf::from("vae-images"),
            only_existing: false,
            debug: false,
        }
    }
}

impl ExperimentConfig {
    /// Deserializes a config from a JSON file.
    pub fn load_json(path: &Path) -> Result<ExperimentConfig> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn model_directory(&self) -> PathBuf {
        self.root_path.join("models")
    }

    pub fn source(&self) -> ImageFolderSource {
        ImageFolderSource {
            root: self.root_path.clone(),
            input_size: self.input_size,
            batch_size: self.batch_size,
            num_workers: self.num_workers,
            pair_target: self.pair_target.clone(),
        }
    }

    pub fn catalog_options(&self, num_classes: usize) -> CatalogOptions {
        CatalogOptions {
            num_classes,
            input_size: self.input_size as usize,
            base_width: self.base_width,
            z_size: self.z_size,
        }
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            similarity_weight: Some(self.similarity_weight),
            debug: self.debug,
            ..LoopOptions::default()
        }
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            model_directory: self.model_directory(),
            images_directory: self.images_directory.clone(),
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            autoencoder_learning_rate: self.autoencoder_learning_rate,
            train_autoencoder: self.train_autoencoder,
            dataset_names: self.dataset_names.clone(),
            loop_options: self.loop_options(),
        }
    }

    pub fn perf_options(&self) -> PerfOptions {
        PerfOptions {
            model_directory: self.model_directory(),
            dataset_names: self.dataset_names.clone(),
            only_existing: self.only_existing,
            loop_options: self.loop_options(),
        }
    }
}
