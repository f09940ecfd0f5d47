use tracing::info;

use super::Optimizer;

/// Reduces the learning rate when a monitored loss stops improving.
///
/// Operates in "min" mode with a relative threshold: a value counts as an
/// improvement when it is below `best · (1 − threshold)`. After more than
/// `patience` non-improving steps the learning rate is multiplied by
/// `factor`, never going below `min_lr`.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    pub factor: f64,
    pub patience: usize,
    pub min_lr: f64,
    pub threshold: f64,
    best: f64,
    bad_epochs: usize,
    epoch: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> ReduceLrOnPlateau {
        ReduceLrOnPlateau {
            factor,
            patience,
            min_lr,
            threshold: 1e-4,
            best: f64::INFINITY,
            bad_epochs: 0,
            epoch: 0,
        }
    }

    /// Records one epoch's metric; returns `true` if the rate was reduced.
    pub fn step(&mut self, metric: f64, optimizer: &mut dyn Optimizer) -> bool {
        self.epoch += 1;
        if metric < self.best * (1.0 - self.threshold) {
            self.best = metric;
            self.bad_epochs = 0;
        } else {
            self.bad_epochs += 1;
        }

        if self.bad_epochs <= self.patience {
            return false;
        }
        self.bad_epochs = 0;

        let old_lr = optimizer.learning_rate();
        let new_lr = (old_lr * self.factor).max(self.min_lr);
        if old_lr - new_lr <= 1e-8 {
            return false;
        }
        optimizer.set_learning_rate(new_lr);
        info!("Epoch {}: reducing learning rate to {:.4e}", self.epoch, new_lr);
        true
    }
}

impl Default for ReduceLrOnPlateau {
    fn default() -> Self {
        ReduceLrOnPlateau::new(0.2, 5, 1e-5)
    }
}
