use serde::{Serialize, Deserialize};

/// Per-epoch statistics of a classification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train_top1_accuracy: f64,
    pub train_top5_accuracy: f64,
    pub train_loss: f64,
    pub validation_top1_accuracy: f64,
    pub validation_top5_accuracy: f64,
    pub validation_loss: f64,
    /// Whether this epoch improved on the best validation top-5 and was saved.
    pub checkpointed: bool,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Per-epoch losses of the autoencoder phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoencoderEpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: f64,
    pub elapsed_ms: u64,
}
