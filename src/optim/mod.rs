pub mod adam;
pub mod clip;
pub mod plateau;
pub mod sgd;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{layers::Param, math::tensor::Tensor};

pub use adam::Adam;
pub use clip::clip_grad_norm;
pub use plateau::ReduceLrOnPlateau;
pub use sgd::Sgd;

/// Parameters handed to an optimizer, keyed by their model-wide name.
pub type NamedParams<'a> = [(String, &'a mut Param)];

pub trait Optimizer {
    /// Applies one update to every parameter from its accumulated gradient.
    fn step(&mut self, params: &mut NamedParams<'_>);

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, learning_rate: f64);

    /// Serializable snapshot of the optimizer's buffers.
    fn state(&self) -> OptimizerState;

    fn name(&self) -> &'static str;
}

/// Optimizer buffers as written into checkpoints (`optimizer_weights`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerState {
    Sgd {
        learning_rate: f64,
        momentum: f64,
        velocity: BTreeMap<String, Tensor>,
    },
    Adam {
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
        step: u64,
        first_moment: BTreeMap<String, Tensor>,
        second_moment: BTreeMap<String, Tensor>,
    },
}
