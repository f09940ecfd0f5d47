use tracing::debug;

use crate::data::DataLoader;
use crate::error::{HarnessError, Result};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::similarity::{similarity_loss, similarity_loss_derivative, DEFAULT_KERNEL_SIZES};
use crate::math::tensor::Tensor;
use crate::models::{ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task};
use crate::optim::{clip_grad_norm, Optimizer};
use crate::score::{score, top_k};
use crate::train::metrics::RunningMetrics;
use crate::train::train_config::LoopOptions;

/// Top-1, top-5 and mean loss of one pass.
pub type PassScores = (f64, f64, f64);

/// One training pass over `loader`.
///
/// Per batch: zero gradients, forward, compose the loss, back-propagate,
/// clip the global norm of the `scope` gradients to
/// `options.grad_clip_norm`, step `optimizer`. Returns the running
/// top-1/top-5 accuracy and mean loss at the end of the pass.
pub fn train(
    model: &mut dyn Model,
    loader: &dyn DataLoader,
    optimizer: &mut dyn Optimizer,
    scope: ParamScope,
    options: &LoopOptions,
) -> Result<PassScores> {
    debug!("Training Start");
    ensure_training(model);
    let result = run_pass(model, loader, Some((optimizer, scope)), options, "Training");
    debug!("Training End");
    result
}

/// One validation pass: eval mode, no parameter updates.
pub fn validate(model: &mut dyn Model, loader: &dyn DataLoader, options: &LoopOptions) -> Result<PassScores> {
    debug!("Validation Start");
    model.set_mode(Mode::Eval);
    let result = run_pass(model, loader, None, options, "Validation");
    debug!("Validation End");
    result
}

/// Keeps a specialised training mode (e.g. `TrainClassifier`) and only
/// leaves `Eval`.
pub(crate) fn ensure_training(model: &mut dyn Model) {
    if !model.mode().is_training() {
        model.set_mode(Mode::Train);
    }
}

/// Loss of one batch and its gradient w.r.t. the model outputs.
struct BatchLoss {
    total: f64,
    /// Classification and weighted-in similarity parts, when similarity is on.
    components: Option<(f64, f64)>,
    grad: OutputGrad,
}

fn compose_loss(
    logits: &Tensor,
    similarity: Option<&[f64]>,
    targets: &[usize],
    options: &LoopOptions,
) -> Result<BatchLoss> {
    let classification = CrossEntropyLoss::loss(logits, targets);
    let logits_grad = CrossEntropyLoss::derivative(logits, targets);

    let Some(weight) = options.similarity_weight else {
        return Ok(BatchLoss {
            total: classification,
            components: None,
            grad: OutputGrad::Classification { logits: logits_grad },
        });
    };
    let similarity = similarity.ok_or(HarnessError::OutputMismatch(
        "a similarity weight is set but the model reports no similarity",
    ))?;

    let similarity_term = similarity_loss(similarity, &DEFAULT_KERNEL_SIZES);
    let similarity_grad = similarity_loss_derivative(&DEFAULT_KERNEL_SIZES)
        .into_iter()
        .map(|g| g * weight)
        .collect();
    Ok(BatchLoss {
        total: classification + weight * similarity_term,
        components: Some((classification, similarity_term)),
        grad: OutputGrad::ClassificationWithSimilarity {
            logits: logits_grad,
            similarity: similarity_grad,
        },
    })
}

fn run_pass(
    model: &mut dyn Model,
    loader: &dyn DataLoader,
    mut update: Option<(&mut dyn Optimizer, ParamScope)>,
    options: &LoopOptions,
    label: &str,
) -> Result<PassScores> {
    let mut metrics = RunningMetrics::new();
    let batch_count = loader.len();

    for (batch_index, batch) in loader.batches().enumerate() {
        let batch = batch?;
        if update.is_some() {
            model.zero_grad();
        }

        let (logits, similarity) = match model.forward(&batch.images, Task::Classify) {
            ForwardOutput::Classification { logits } => (logits, None),
            ForwardOutput::ClassificationWithSimilarity { logits, similarity } => (logits, Some(similarity)),
            ForwardOutput::Reconstruction { .. } => {
                return Err(HarnessError::OutputMismatch(
                    "classification loop received a reconstruction",
                ))
            }
        };

        let predicted = top_k(&logits, 5);
        let (top1, top5, total) = score(&predicted, &batch.targets);
        metrics.record_scores(top1, top5, total);

        let loss = compose_loss(&logits, similarity.as_deref(), &batch.targets, options)?;
        metrics.record_loss(loss.total);
        if let Some((classification, similarity)) = loss.components {
            metrics.record_components(classification, similarity);
        }

        if let Some((optimizer, scope)) = update.as_mut() {
            model.backward(loss.grad);
            let mut params = model.params_mut(*scope);
            clip_grad_norm(&mut params, options.grad_clip_norm);
            optimizer.step(&mut params);
        }

        if (batch_index + 1) % options.log_interval.max(1) == 0 {
            match options.similarity_weight {
                Some(weight) => debug!(
                    "{} Batch {}/{}: Top1 Accuracy {:.4} Top5 Accuracy {:.4} Loss {:.4} Classification Loss {:.4} Similarity Loss {:.4} Similarity Weight {:.2}",
                    label,
                    batch_index + 1,
                    batch_count,
                    metrics.top1_accuracy(),
                    metrics.top5_accuracy(),
                    metrics.mean_loss(),
                    metrics.mean_classification_loss(),
                    metrics.mean_similarity_loss(),
                    weight
                ),
                None => debug!(
                    "{} Batch {}/{}: Top1 Accuracy {:.4} Top5 Accuracy {:.4} Loss {:.4}",
                    label,
                    batch_index + 1,
                    batch_count,
                    metrics.top1_accuracy(),
                    metrics.top5_accuracy(),
                    metrics.mean_loss()
                ),
            }
            if options.debug {
                break;
            }
        }
    }

    if metrics.batches() == 0 {
        return Err(HarnessError::EmptyLoader);
    }
    Ok((metrics.top1_accuracy(), metrics.top5_accuracy(), metrics.mean_loss()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::data::{InMemoryLoader, Sample};
    use crate::layers::{Dense, Flatten, Layer, Param};
    use crate::models::Capabilities;
    use crate::network::sequential::{scoped, Sequential};
    use crate::optim::Sgd;

    /// Linear classifier over flattened images.
    struct Linear {
        net: Sequential,
        mode: Mode,
        forwards: usize,
    }

    impl Linear {
        fn new(inputs: usize, classes: usize) -> Linear {
            Linear {
                net: Sequential::new()
                    .with(Flatten::new())
                    .with(Dense::new(classes, inputs, ActivationFunction::Identity)),
                mode: Mode::Eval,
                forwards: 0,
            }
        }
    }

    impl Model for Linear {
        fn capabilities(&self) -> Capabilities {
            Capabilities::default()
        }

        fn mode(&self) -> Mode {
            self.mode
        }

        fn set_mode(&mut self, mode: Mode) {
            self.mode = mode;
        }

        fn forward(&mut self, images: &Tensor, _task: Task) -> ForwardOutput {
            self.forwards += 1;
            ForwardOutput::Classification { logits: self.net.forward(images) }
        }

        fn backward(&mut self, grad: OutputGrad) {
            if let OutputGrad::Classification { logits } = grad {
                self.net.backward(&logits);
            }
        }

        fn params_mut(&mut self, _scope: ParamScope) -> Vec<(String, &mut Param)> {
            scoped("net", self.net.params_mut())
        }
    }

    /// Two separable classes: bright images are class 1.
    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let target = i % 2;
                let value = if target == 1 { 1.0 } else { -1.0 };
                Sample { image: Tensor::full(&[1, 2, 2], value), target, target_image: None }
            })
            .collect()
    }

    #[test]
    fn training_reduces_the_loss() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(samples(16), 4, true);
        let mut sgd = Sgd::with_momentum(0.1, 0.9);
        let options = LoopOptions::default();

        let (_, _, before) = validate(&mut model, &loader, &options).unwrap();
        for _ in 0..10 {
            train(&mut model, &loader, &mut sgd, ParamScope::Trainable, &options).unwrap();
        }
        let (top1, top5, after) = validate(&mut model, &loader, &options).unwrap();
        assert!(after < before, "{after} !< {before}");
        assert_eq!(top1, 1.0);
        assert_eq!(top5, 1.0);
        assert_eq!(model.mode(), Mode::Eval);
    }

    #[test]
    fn validation_leaves_parameters_untouched() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(samples(8), 4, false);
        let before = model.state_dict();
        validate(&mut model, &loader, &LoopOptions::default()).unwrap();
        assert_eq!(model.state_dict(), before);
    }

    #[test]
    fn debug_stops_at_the_first_logging_point() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(samples(8), 1, false);
        let mut sgd = Sgd::new(0.0);
        let options = LoopOptions { debug: true, log_interval: 3, ..LoopOptions::default() };
        train(&mut model, &loader, &mut sgd, ParamScope::All, &options).unwrap();
        assert_eq!(model.forwards, 3);
    }

    #[test]
    fn similarity_weight_requires_a_similarity_output() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(samples(2), 2, false);
        let options = LoopOptions { similarity_weight: Some(0.04), ..LoopOptions::default() };
        assert!(matches!(
            validate(&mut model, &loader, &options),
            Err(HarnessError::OutputMismatch(_))
        ));
    }

    #[test]
    fn empty_loader_is_an_error() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(Vec::new(), 2, false);
        assert!(matches!(
            validate(&mut model, &loader, &LoopOptions::default()),
            Err(HarnessError::EmptyLoader)
        ));
    }

    #[test]
    fn fewer_than_five_classes_still_scores() {
        let mut model = Linear::new(4, 2);
        let loader = InMemoryLoader::new(samples(4), 4, false);
        let (_, top5, _) = validate(&mut model, &loader, &LoopOptions::default()).unwrap();
        assert_eq!(top5, 1.0);
    }
}
