use std::path::Path;

use tracing::debug;

use crate::data::{Batch, DataLoader};
use crate::error::{HarnessError, Result};
use crate::loss::vae::VaeLoss;
use crate::math::tensor::Tensor;
use crate::models::{ForwardOutput, Mode, Model, OutputGrad, ParamScope, Task};
use crate::optim::{clip_grad_norm, Optimizer};
use crate::train::kl::KlAnnealing;
use crate::train::loop_fn::ensure_training;
use crate::train::train_config::LoopOptions;
use crate::util::image::save_image_grid;

/// Columns of the reconstruction comparison grid.
const COMPARISON_COLUMNS: usize = 8;

/// One autoencoder training pass; returns the mean per-sample loss.
pub fn train_autoencoder(
    model: &mut dyn Model,
    loader: &dyn DataLoader,
    optimizer: &mut dyn Optimizer,
    scope: ParamScope,
    options: &LoopOptions,
) -> Result<f64> {
    debug!("Training Start");
    ensure_training(model);
    let result = run_pass(model, loader, Some((optimizer, scope)), None, options, "Training");
    debug!("Training End");
    result
}

/// One autoencoder validation pass. The first batch's targets and
/// reconstructions are written to `comparison_path` as a two-row grid.
pub fn validate_autoencoder(
    model: &mut dyn Model,
    loader: &dyn DataLoader,
    options: &LoopOptions,
    comparison_path: &Path,
) -> Result<f64> {
    debug!("Validation Start");
    model.set_mode(Mode::Eval);
    let result = run_pass(model, loader, None, Some(comparison_path), options, "Validation");
    debug!("Validation End");
    result
}

fn reconstruct(model: &mut dyn Model, batch: &Batch) -> Result<(Tensor, Tensor, Tensor)> {
    match model.forward(&batch.images, Task::Reconstruct) {
        ForwardOutput::Reconstruction { reconstruction, mu, logvar } => Ok((reconstruction, mu, logvar)),
        _ => Err(HarnessError::OutputMismatch("autoencoder loop needs a reconstruction")),
    }
}

fn run_pass(
    model: &mut dyn Model,
    loader: &dyn DataLoader,
    mut update: Option<(&mut dyn Optimizer, ParamScope)>,
    comparison_path: Option<&Path>,
    options: &LoopOptions,
    label: &str,
) -> Result<f64> {
    let batch_count = loader.len();
    let mut kl_schedule = KlAnnealing::new(batch_count);
    debug!(
        "KL: INIT: {} WEIGHT: {} MAX: {} STEP: {}",
        kl_schedule.init,
        kl_schedule.weight(),
        kl_schedule.max,
        kl_schedule.step
    );

    let mut losses = Vec::new();
    for (batch_index, batch) in loader.batches().enumerate() {
        let batch = batch?;
        let target = batch.target_images.as_ref().ok_or(HarnessError::MissingTargetImages)?;
        if update.is_some() {
            model.zero_grad();
        }

        let (reconstruction, mu, logvar) = reconstruct(model, &batch)?;
        let (mse, kl) = VaeLoss::loss(&reconstruction, target, &mu, &logvar);
        let kl_weight = kl_schedule.weight();
        let clamped_kl = kl.max(options.habits_lambda);
        let effective_kl = clamped_kl * kl_weight;
        let batch_loss = mse + effective_kl;
        debug!(
            "BATCH LOSS: {} MSE: {} KL-EFFECTIVE: {} KL-CLAMPED: {} KL: {} KL-WEIGHT: {}",
            batch_loss, mse, effective_kl, clamped_kl, kl, kl_weight
        );

        kl_schedule.advance(batch_index);
        losses.push(batch_loss / batch.len() as f64);

        if let Some((optimizer, scope)) = update.as_mut() {
            // Below the floor the clamp is constant, so KL contributes no gradient.
            let kl_scale = if kl > options.habits_lambda { kl_weight } else { 0.0 };
            let grad = VaeLoss::derivative(&reconstruction, target, &mu, &logvar, kl_scale);
            model.backward(OutputGrad::Reconstruction {
                reconstruction: grad.reconstruction,
                mu: grad.mu,
                logvar: grad.logvar,
            });
            let mut params = model.params_mut(*scope);
            clip_grad_norm(&mut params, options.grad_clip_norm);
            optimizer.step(&mut params);
        }

        if batch_index == 0 {
            if let Some(path) = comparison_path {
                let n = batch.len().min(COMPARISON_COLUMNS);
                let comparison = Tensor::cat(&[target.narrow(n), reconstruction.reshape(&target.shape).narrow(n)]);
                save_image_grid(&comparison, n, true, path)?;
            }
        }

        if (batch_index + 1) % options.log_interval.max(1) == 0 {
            debug!(
                "{} Batch {}/{}: Loss {:.4}",
                label,
                batch_index + 1,
                batch_count,
                losses.iter().sum::<f64>() / losses.len() as f64
            );
            if options.debug {
                break;
            }
        }
    }

    if losses.is_empty() {
        return Err(HarnessError::EmptyLoader);
    }
    Ok(losses.iter().sum::<f64>() / losses.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryLoader, Sample};
    use crate::layers::Param;
    use crate::models::vae::{Vae, VaeConfig};
    use crate::models::Capabilities;
    use crate::optim::{Adam, Sgd};
    use approx::assert_abs_diff_eq;

    /// Reconstructs every pixel as 0.5 from a posterior with constant
    /// `mu` over two latent units and `logvar = 0`.
    struct FixedPosterior {
        mu: f64,
        bias: Param,
        mode: Mode,
        /// `mu` gradient of every backward call, in order.
        mu_grads: Vec<Vec<f64>>,
        logvar_grads: Vec<Vec<f64>>,
    }

    impl FixedPosterior {
        fn new(mu: f64) -> FixedPosterior {
            FixedPosterior {
                mu,
                bias: Param::new(Tensor::zeros(&[1])),
                mode: Mode::TrainAutoencoder,
                mu_grads: Vec::new(),
                logvar_grads: Vec::new(),
            }
        }
    }

    impl Model for FixedPosterior {
        fn capabilities(&self) -> Capabilities {
            Capabilities { similarity: false, autoencoder: true }
        }

        fn mode(&self) -> Mode {
            self.mode
        }

        fn set_mode(&mut self, mode: Mode) {
            self.mode = mode;
        }

        fn forward(&mut self, images: &Tensor, _task: Task) -> ForwardOutput {
            let n = images.shape[0];
            ForwardOutput::Reconstruction {
                reconstruction: Tensor::full(&images.shape, 0.5),
                mu: Tensor::full(&[n, 2], self.mu),
                logvar: Tensor::zeros(&[n, 2]),
            }
        }

        fn backward(&mut self, grad: OutputGrad) {
            if let OutputGrad::Reconstruction { mu, logvar, .. } = grad {
                self.mu_grads.push(mu.data);
                self.logvar_grads.push(logvar.data);
            }
        }

        fn params_mut(&mut self, _scope: ParamScope) -> Vec<(String, &mut Param)> {
            vec![("bias".to_string(), &mut self.bias)]
        }
    }

    /// Six black 1x2x2 images in batches of two. Three batches give a KL
    /// weight of 0, 0, 1: the ramp starts after batch 1.
    fn three_batches() -> InMemoryLoader {
        let samples = (0..6)
            .map(|i| Sample {
                image: Tensor::zeros(&[1, 2, 2]),
                target: i % 2,
                target_image: Some(Tensor::zeros(&[1, 2, 2])),
            })
            .collect();
        InMemoryLoader::new(samples, 2, false)
    }

    fn train_fixed(mu: f64) -> (f64, FixedPosterior) {
        let mut model = FixedPosterior::new(mu);
        let mut sgd = Sgd::new(0.0);
        let loss =
            train_autoencoder(&mut model, &three_batches(), &mut sgd, ParamScope::Autoencoder, &LoopOptions::default())
                .unwrap();
        (loss, model)
    }

    #[test]
    fn kl_enters_the_loss_with_the_annealed_weight() {
        // mse = 0.25; kl = 0.5 * 4 * 1² = 2 is above the floor.
        let (loss, model) = train_fixed(1.0);
        let per_batch = [0.25 / 2.0, 0.25 / 2.0, (0.25 + 2.0) / 2.0];
        assert_abs_diff_eq!(loss, per_batch.iter().sum::<f64>() / 3.0, epsilon = 1e-12);

        assert_eq!(model.mu_grads.len(), 3);
        assert!(model.mu_grads[0].iter().all(|g| *g == 0.0));
        assert!(model.mu_grads[1].iter().all(|g| *g == 0.0));
        // d kl / d mu = mu, scaled by the weight of 1.
        assert!(model.mu_grads[2].iter().all(|g| (*g - 1.0).abs() < 1e-12));
    }

    #[test]
    fn kl_below_the_floor_is_clamped_and_carries_no_gradient() {
        // kl = 0.5 * 4 * 0.1² = 0.02, clamped to 0.2.
        let (loss, model) = train_fixed(0.1);
        let per_batch = [0.25 / 2.0, 0.25 / 2.0, (0.25 + 0.2) / 2.0];
        assert_abs_diff_eq!(loss, per_batch.iter().sum::<f64>() / 3.0, epsilon = 1e-12);

        for (mu, logvar) in model.mu_grads.iter().zip(&model.logvar_grads) {
            assert!(mu.iter().chain(logvar).all(|g| *g == 0.0));
        }
    }

    fn pair_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let image = Tensor::full(&[3, 8, 8], (i % 4) as f64 / 4.0);
                Sample { image: image.clone(), target: i % 2, target_image: Some(image) }
            })
            .collect()
    }

    fn vae() -> Vae {
        Vae::new(VaeConfig { base_width: 2, input_size: 8, z_size: 3, num_classes: 2 })
    }

    #[test]
    fn validation_writes_the_comparison_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let mut model = vae();
        let loader = InMemoryLoader::new(pair_samples(5), 5, false);

        let loss = validate_autoencoder(&mut model, &loader, &LoopOptions::default(), &path).unwrap();
        assert!(loss.is_finite() && loss >= 0.0);

        let grid = image::open(&path).unwrap();
        // Two rows of five 8x8 tiles with 2 px padding.
        assert_eq!(grid.width(), 5 * 10 + 2);
        assert_eq!(grid.height(), 2 * 10 + 2);
    }

    #[test]
    fn training_updates_only_the_autoencoder_scope() {
        let mut model = vae();
        model.set_mode(Mode::TrainAutoencoder);
        let loader = InMemoryLoader::new(pair_samples(6), 3, true);
        let mut adam = Adam::new(1e-2);

        let classifier_before = crate::network::state::collect_state(model.params_mut(ParamScope::Classifier));
        let loss = train_autoencoder(&mut model, &loader, &mut adam, ParamScope::Autoencoder, &LoopOptions::default())
            .unwrap();
        assert!(loss.is_finite());
        assert_eq!(model.mode(), Mode::TrainAutoencoder);
        let classifier_after = crate::network::state::collect_state(model.params_mut(ParamScope::Classifier));
        assert_eq!(classifier_before, classifier_after);
    }

    #[test]
    fn batches_without_targets_are_rejected() {
        let mut model = vae();
        let samples = vec![Sample { image: Tensor::zeros(&[3, 8, 8]), target: 0, target_image: None }];
        let loader = InMemoryLoader::new(samples, 1, false);
        let mut adam = Adam::new(1e-3);
        assert!(matches!(
            train_autoencoder(&mut model, &loader, &mut adam, ParamScope::Autoencoder, &LoopOptions::default()),
            Err(HarnessError::MissingTargetImages)
        ));
    }
}
