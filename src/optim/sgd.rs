use std::collections::BTreeMap;

use crate::math::tensor::Tensor;
use super::{NamedParams, Optimizer, OptimizerState};

/// Stochastic gradient descent with classical momentum:
///   v ← μ·v + g
///   θ ← θ − lr·v
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: BTreeMap<String, Tensor>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd::with_momentum(learning_rate, 0.0)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64) -> Sgd {
        Sgd { learning_rate, momentum, velocity: BTreeMap::new() }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: &mut NamedParams<'_>) {
        for (name, param) in params.iter_mut() {
            let update = if self.momentum > 0.0 {
                // The first step seeds the buffer with the raw gradient.
                let v = self
                    .velocity
                    .entry(name.clone())
                    .and_modify(|v| {
                        v.scale_in_place(self.momentum);
                        v.add_assign(&param.grad);
                    })
                    .or_insert_with(|| param.grad.clone());
                v.clone()
            } else {
                param.grad.clone()
            };
            let lr = self.learning_rate;
            for (w, u) in param.value.data.iter_mut().zip(&update.data) {
                *w -= lr * u;
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Sgd {
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            velocity: self.velocity.clone(),
        }
    }

    fn name(&self) -> &'static str {
        if self.momentum > 0.0 {
            "SGD w/ Momentum"
        } else {
            "SGD"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Param;
    use approx::assert_abs_diff_eq;

    #[test]
    fn momentum_accumulates_across_steps() {
        let mut p = Param::new(Tensor::from_vec(&[1], vec![1.0]));
        let mut sgd = Sgd::with_momentum(0.1, 0.9);

        p.grad.data[0] = 1.0;
        sgd.step(&mut [("w".to_string(), &mut p)]);
        assert_abs_diff_eq!(p.value.data[0], 0.9, epsilon = 1e-12);

        // v = 0.9 * 1 + 1 = 1.9
        sgd.step(&mut [("w".to_string(), &mut p)]);
        assert_abs_diff_eq!(p.value.data[0], 0.9 - 0.19, epsilon = 1e-12);

        match sgd.state() {
            OptimizerState::Sgd { velocity, .. } => {
                assert_abs_diff_eq!(velocity["w"].data[0], 1.9, epsilon = 1e-12)
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn name_reflects_momentum() {
        assert_eq!(Sgd::new(0.1).name(), "SGD");
        assert_eq!(Sgd::with_momentum(0.1, 0.9).name(), "SGD w/ Momentum");
    }
}
