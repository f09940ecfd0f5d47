use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{DataLoader, DatasetSource, Split};
use crate::error::Result;
use crate::models::{Mode, Model, ParamScope};
use crate::optim::{Adam, Optimizer, ReduceLrOnPlateau, Sgd};
use crate::train::autoencoder::{train_autoencoder, validate_autoencoder};
use crate::train::checkpoint::{checkpoint_path, Checkpoint};
use crate::train::epoch_stats::{AutoencoderEpochStats, EpochStats};
use crate::train::loop_fn::{train, validate};
use crate::train::train_config::{LoopOptions, RunConfig};
use crate::util::image::save_image_grid;

const MOMENTUM: f64 = 0.9;
/// Latent vectors decoded into the per-epoch sample grid.
const SAMPLE_COUNT: usize = 64;
const SAMPLE_COLUMNS: usize = 8;

/// Validation scores of a model on one dataset variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetScore {
    pub dataset: String,
    pub top1: f64,
    pub top5: f64,
    pub loss: f64,
}

/// Outcome of a classification run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub history: Vec<EpochStats>,
    /// The last checkpoint written, i.e. the best validation top-5.
    pub best: Option<Checkpoint>,
    /// Final re-evaluation across `RunConfig::dataset_names`.
    pub evaluation: Vec<DatasetScore>,
}

/// Outcome of a two-phase autoencoder run.
#[derive(Debug, Clone)]
pub struct AutoencoderRunReport {
    pub autoencoder: Vec<AutoencoderEpochStats>,
    pub classifier: RunReport,
}

/// The loop options a model actually trains with: the similarity term
/// only applies to models that report similarity.
fn effective_options(model: &dyn Model, options: &LoopOptions) -> LoopOptions {
    LoopOptions {
        similarity_weight: options.similarity_weight.filter(|_| model.capabilities().similarity),
        ..options.clone()
    }
}

/// Runs the validation loop on the `val` split of every dataset in
/// `dataset_names`, handing one line per dataset to `report`.
pub fn evaluate_model(
    model: &mut dyn Model,
    source: &dyn DatasetSource,
    dataset_names: &[String],
    options: &LoopOptions,
    report: &mut dyn FnMut(&str),
) -> Result<Vec<DatasetScore>> {
    let options = effective_options(model, options);
    let mut scores = Vec::with_capacity(dataset_names.len());
    for name in dataset_names {
        let loader = source.loader(name, Split::Val)?;
        let (top1, top5, loss) = validate(model, loader.as_ref(), &options)?;
        report(&format!(
            "{name}: Loss: {loss:.4} Top1 Accuracy: {top1:.4} Top5 Accuracy: {top5:.4}"
        ));
        scores.push(DatasetScore { dataset: name.clone(), top1, top5, loss });
    }
    Ok(scores)
}

/// Trains a classifier for `config.epochs` epochs with SGD and a plateau
/// scheduler, checkpointing whenever validation top-5 strictly improves.
///
/// Models with the autoencoder capability only optimize their classifier
/// head. The model's current training mode is kept across epochs.
pub fn run(
    model_name: &str,
    model: &mut dyn Model,
    train_loader: &dyn DataLoader,
    val_loader: &dyn DataLoader,
    source: &dyn DatasetSource,
    config: &RunConfig,
) -> Result<RunReport> {
    let options = effective_options(model, &config.loop_options);
    let scope = if model.capabilities().autoencoder {
        ParamScope::Classifier
    } else {
        ParamScope::Trainable
    };
    let mut optimizer = Sgd::with_momentum(config.learning_rate, MOMENTUM);
    let mut scheduler = ReduceLrOnPlateau::default();

    info!("Epochs {}", config.epochs);
    info!("Batch Size {}", train_loader.batch_size());
    info!("Number of Workers {}", train_loader.num_workers());
    info!("Optimizer {}", optimizer.name());
    info!("Learning Rate {}", config.learning_rate);
    info!("Similarity Weight {:?}", options.similarity_weight);

    let train_mode = match model.mode() {
        Mode::Eval => Mode::Train,
        mode => mode,
    };
    let path = checkpoint_path(&config.model_directory, model_name);
    let mut best_validation_accuracy = -1.0;
    let mut best: Option<Checkpoint> = None;
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();
        model.set_mode(train_mode);
        let (train_top1, train_top5, train_loss) = train(model, train_loader, &mut optimizer, scope, &options)?;
        let (validation_top1, validation_top5, validation_loss) = validate(model, val_loader, &options)?;
        info!(
            "Epoch {}: Train: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4} Validation: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4}",
            epoch, train_loss, train_top1, train_top5, validation_loss, validation_top1, validation_top5
        );

        scheduler.step(validation_loss, &mut optimizer);

        let checkpointed = validation_top5 > best_validation_accuracy;
        if checkpointed {
            debug!("Improved Validation Score, saving new weights");
            let checkpoint = Checkpoint {
                epoch,
                train_top1_accuracy: Some(train_top1),
                train_top5_accuracy: Some(train_top5),
                train_loss,
                validation_top1_accuracy: Some(validation_top1),
                validation_top5_accuracy: Some(validation_top5),
                validation_loss,
                weights: model.state_dict(),
                optimizer_weights: optimizer.state(),
            };
            checkpoint.save_json(&path)?;
            best_validation_accuracy = validation_top5;
            best = Some(checkpoint);
        }

        history.push(EpochStats {
            epoch,
            train_top1_accuracy: train_top1,
            train_top5_accuracy: train_top5,
            train_loss,
            validation_top1_accuracy: validation_top1,
            validation_top5_accuracy: validation_top5,
            validation_loss,
            checkpointed,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        });
    }

    if let Some(best) = &best {
        info!("Epoch {}", best.epoch);
    }
    let evaluation = evaluate_model(model, source, &config.dataset_names, &options, &mut |line: &str| info!("{line}"))?;
    if let Some(best) = &best {
        info!(
            "Train: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4}",
            best.train_loss,
            best.train_top1_accuracy.unwrap_or_default(),
            best.train_top5_accuracy.unwrap_or_default()
        );
        info!(
            "Validation: Loss: {:.4} Top1 Accuracy: {:.4} Top5 Accuracy: {:.4}",
            best.validation_loss,
            best.validation_top1_accuracy.unwrap_or_default(),
            best.validation_top5_accuracy.unwrap_or_default()
        );
    }

    Ok(RunReport { history, best, evaluation })
}

/// Two-phase run of an autoencoder classifier.
///
/// Phase 1 (when `config.train_autoencoder` is set) trains encoder and
/// decoder with Adam, saving a reconstruction grid and a grid of decoded
/// latent samples every epoch and checkpointing unconditionally. Phase 2
/// switches the model to `TrainClassifier` and hands over to [`run`].
#[allow(clippy::too_many_arguments)]
pub fn run_autoencoder(
    model_name: &str,
    model: &mut dyn Model,
    pair_train_loader: &dyn DataLoader,
    pair_val_loader: &dyn DataLoader,
    train_loader: &dyn DataLoader,
    val_loader: &dyn DataLoader,
    source: &dyn DatasetSource,
    config: &RunConfig,
) -> Result<AutoencoderRunReport> {
    let mut autoencoder = Vec::new();

    if config.train_autoencoder {
        let mut optimizer = Adam::new(config.autoencoder_learning_rate);
        let mut scheduler = ReduceLrOnPlateau::default();
        let options = LoopOptions { similarity_weight: None, ..config.loop_options.clone() };
        let path = checkpoint_path(&config.model_directory, model_name);

        info!("Epochs {}", config.epochs);
        info!("Batch Size {}", pair_train_loader.batch_size());
        info!("Number of Workers {}", pair_train_loader.num_workers());
        info!("Optimizer {}", optimizer.name());
        info!("Autoencoder Learning Rate {}", config.autoencoder_learning_rate);

        for epoch in 1..=config.epochs {
            let t_start = Instant::now();
            model.set_mode(Mode::TrainAutoencoder);
            let train_loss =
                train_autoencoder(model, pair_train_loader, &mut optimizer, ParamScope::Autoencoder, &options)?;

            model.set_mode(Mode::Eval);
            let comparison = config.images_directory.join(format!("{model_name}_epoch_{epoch}.png"));
            let validation_loss = validate_autoencoder(model, pair_val_loader, &options, &comparison)?;

            if let Some(samples) = model.sample(SAMPLE_COUNT) {
                let samples_path = config
                    .images_directory
                    .join(format!("{model_name}_epoch_{epoch}_samples.png"));
                save_image_grid(&samples, SAMPLE_COLUMNS, true, &samples_path)?;
            }
            info!("Epoch {}: Train: Loss: {:.4} Validation: Loss: {:.4}", epoch, train_loss, validation_loss);

            scheduler.step(validation_loss, &mut optimizer);

            debug!("Saving new weights");
            Checkpoint {
                epoch,
                train_top1_accuracy: None,
                train_top5_accuracy: None,
                train_loss,
                validation_top1_accuracy: None,
                validation_top5_accuracy: None,
                validation_loss,
                weights: model.state_dict(),
                optimizer_weights: optimizer.state(),
            }
            .save_json(&path)?;

            autoencoder.push(AutoencoderEpochStats {
                epoch,
                train_loss,
                validation_loss,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            });
        }

        if let Some(last) = autoencoder.last() {
            info!("Epoch {}", last.epoch);
        }
    }

    model.set_mode(Mode::TrainClassifier);
    let classifier = run(model_name, model, train_loader, val_loader, source, config)?;

    if let Some(last) = autoencoder.last() {
        info!("Train: Loss: {:.4}", last.train_loss);
        info!("Validation: Loss: {:.4}", last.validation_loss);
    }

    Ok(AutoencoderRunReport { autoencoder, classifier })
}
