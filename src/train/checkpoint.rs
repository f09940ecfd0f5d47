use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::network::state::StateDict;
use crate::optim::OptimizerState;

/// Snapshot of a model and its optimizer at the end of an epoch.
///
/// Autoencoder-phase checkpoints carry losses only; the accuracy fields are
/// then absent from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_top1_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_top5_accuracy: Option<f64>,
    pub train_loss: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_top1_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_top5_accuracy: Option<f64>,
    pub validation_loss: f64,
    pub weights: StateDict,
    pub optimizer_weights: OptimizerState,
}

impl Checkpoint {
    /// True for checkpoints written by a classification run.
    pub fn has_accuracy(&self) -> bool {
        self.validation_top5_accuracy.is_some()
    }

    /// Serializes the checkpoint to a JSON file, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Like `load_json`, but a missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Checkpoint>> {
        if !path.is_file() {
            return Ok(None);
        }
        Checkpoint::load_json(path).map(Some)
    }
}

/// `<model_directory>/<model_name>.ckpt`
pub fn checkpoint_path(model_directory: &Path, model_name: &str) -> PathBuf {
    model_directory.join(format!("{model_name}.ckpt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;
    use std::collections::BTreeMap;

    fn autoencoder_checkpoint() -> Checkpoint {
        let mut weights = BTreeMap::new();
        weights.insert("decoder.0.weight".to_string(), Tensor::from_vec(&[2], vec![0.5, -0.5]));
        Checkpoint {
            epoch: 3,
            train_top1_accuracy: None,
            train_top5_accuracy: None,
            train_loss: 0.25,
            validation_top1_accuracy: None,
            validation_top5_accuracy: None,
            validation_loss: 0.5,
            weights,
            optimizer_weights: OptimizerState::Sgd {
                learning_rate: 0.01,
                momentum: 0.9,
                velocity: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn autoencoder_checkpoints_omit_accuracy_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = checkpoint_path(&dir.path().join("models"), "vae");
        let checkpoint = autoencoder_checkpoint();
        checkpoint.save_json(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(!keys.contains(&"train_top1_accuracy"));
        assert!(keys.contains(&"optimizer_weights"));
        assert_eq!(json["optimizer_weights"]["kind"], "sgd");

        let loaded = Checkpoint::load(&path).unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(!loaded.has_accuracy());
    }

    #[test]
    fn missing_checkpoint_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Checkpoint::load(&dir.path().join("absent.ckpt")).unwrap().is_none());
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ckpt");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Checkpoint::load(&path).is_err());
    }
}
