use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while running an experiment.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("dataset directory {0} does not exist or has no class folders")]
    MissingDataset(PathBuf),

    #[error("unknown model `{0}`")]
    UnknownModel(String),

    #[error("state dict mismatch: {0}")]
    StateDict(String),

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("could not start the decoding pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("data loader yielded no batches")]
    EmptyLoader,

    #[error("batch carries no reconstruction targets")]
    MissingTargetImages,

    #[error("model output does not match the loop: {0}")]
    OutputMismatch(&'static str),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
