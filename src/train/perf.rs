use std::path::PathBuf;

use tracing::warn;

use crate::data::DatasetSource;
use crate::models::{CatalogEntry, CatalogOptions, Mode};
use crate::train::checkpoint::{checkpoint_path, Checkpoint};
use crate::train::run::{evaluate_model, DatasetScore};
use crate::train::train_config::LoopOptions;

/// Settings of a performance sweep.
#[derive(Debug, Clone)]
pub struct PerfOptions {
    pub model_directory: PathBuf,
    pub dataset_names: Vec<String>,
    /// Report stored metrics only; skip re-evaluation.
    pub only_existing: bool,
    pub loop_options: LoopOptions,
}

/// What the sweep found for one catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PerfOutcome {
    Missing,
    Loaded {
        epoch: usize,
        evaluation: Vec<DatasetScore>,
    },
    /// The checkpoint was present but could not be used.
    Failed(String),
}

/// Reports the stored metrics of every entry's checkpoint and, unless
/// `only_existing` is set, re-evaluates it on each dataset.
///
/// Lines go to `report`. A missing, corrupt or mismatched checkpoint is
/// reported and the sweep moves on to the next entry.
pub fn perf(
    entries: &[CatalogEntry],
    catalog_options: &CatalogOptions,
    source: &dyn DatasetSource,
    options: &PerfOptions,
    report: &mut dyn FnMut(&str),
) -> Vec<(String, PerfOutcome)> {
    let mut outcomes = Vec::with_capacity(entries.len());

    for entry in entries {
        report(entry.name);
        let path = checkpoint_path(&options.model_directory, entry.name);
        report(&path.display().to_string());

        let checkpoint = match Checkpoint::load(&path) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                report(&format!("Checkpoint not available for model {}", entry.name));
                outcomes.push((entry.name.to_string(), PerfOutcome::Missing));
                continue;
            }
            Err(e) => {
                warn!("unreadable checkpoint {}: {}", path.display(), e);
                report(&format!("Checkpoint for model {} could not be read: {}", entry.name, e));
                outcomes.push((entry.name.to_string(), PerfOutcome::Failed(e.to_string())));
                continue;
            }
        };

        let mut model = entry.build(catalog_options);
        if let Err(e) = model.load_state_dict(&checkpoint.weights) {
            report(&format!("Checkpoint for model {} does not fit: {}", entry.name, e));
            outcomes.push((entry.name.to_string(), PerfOutcome::Failed(e.to_string())));
            continue;
        }
        model.set_mode(Mode::Eval);

        report(&summary_line(&checkpoint));

        let evaluation = if options.only_existing {
            Vec::new()
        } else {
            match evaluate_model(model.as_mut(), source, &options.dataset_names, &options.loop_options, report) {
                Ok(scores) => scores,
                Err(e) => {
                    report(&format!("Evaluation of model {} failed: {}", entry.name, e));
                    outcomes.push((entry.name.to_string(), PerfOutcome::Failed(e.to_string())));
                    continue;
                }
            }
        };
        outcomes.push((entry.name.to_string(), PerfOutcome::Loaded { epoch: checkpoint.epoch, evaluation }));
    }

    outcomes
}

fn summary_line(checkpoint: &Checkpoint) -> String {
    match (
        checkpoint.train_top1_accuracy,
        checkpoint.train_top5_accuracy,
        checkpoint.validation_top1_accuracy,
        checkpoint.validation_top5_accuracy,
    ) {
        (Some(train_top1), Some(train_top5), Some(validation_top1), Some(validation_top5)) => format!(
            "Epoch: {} Validation: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4} Train: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4}",
            checkpoint.epoch,
            checkpoint.validation_loss,
            validation_top1,
            validation_top5,
            checkpoint.train_loss,
            train_top1,
            train_top5
        ),
        _ => format!(
            "Epoch: {} Validation: Loss: {:.4} Train: Loss: {:.4}",
            checkpoint.epoch, checkpoint.validation_loss, checkpoint.train_loss
        ),
    }
}
