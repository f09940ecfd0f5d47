use std::path::PathBuf;

/// Knobs shared by the per-epoch training and validation loops.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Weight of the similarity term; `None` trains on classification alone.
    pub similarity_weight: Option<f64>,
    pub grad_clip_norm: f64,
    /// Running metrics are logged every `log_interval` batches.
    pub log_interval: usize,
    /// Stop each pass at its first logging point.
    pub debug: bool,
    /// Floor applied to the KL term before annealing.
    pub habits_lambda: f64,
}

impl Default for LoopOptions {
    fn default() -> Self {
        LoopOptions {
            similarity_weight: None,
            grad_clip_norm: 50.0,
            log_interval: 10,
            debug: false,
            habits_lambda: 0.2,
        }
    }
}

/// Configuration for one model's run.
///
/// # Fields
/// - `model_directory`: checkpoints land at `<model_directory>/<name>.ckpt`
/// - `images_directory`: reconstruction and sample grids of autoencoder runs
/// - `learning_rate`: SGD rate of the classification phase
/// - `autoencoder_learning_rate`: Adam rate of the autoencoder phase
/// - `train_autoencoder`: run the autoencoder phase before the classifier
/// - `dataset_names`: validation splits re-evaluated after training
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub model_directory: PathBuf,
    pub images_directory: PathBuf,
    pub epochs: usize,
    pub learning_rate: f64,
    pub autoencoder_learning_rate: f64,
    pub train_autoencoder: bool,
    pub dataset_names: Vec<String>,
    pub loop_options: LoopOptions,
}

impl RunConfig {
    /// Creates a `RunConfig` with the harness defaults for everything but
    /// the output directory and the epoch count.
    pub fn new(model_directory: impl Into<PathBuf>, epochs: usize) -> Self {
        RunConfig {
            model_directory: model_directory.into(),
            images_directory: PathBuf::from("vae-images"),
            epochs,
            learning_rate: 0.01,
            autoencoder_learning_rate: 1e-3,
            train_autoencoder: true,
            dataset_names: Vec::new(),
            loop_options: LoopOptions::default(),
        }
    }
}
