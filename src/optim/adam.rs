use std::collections::BTreeMap;

use crate::math::tensor::Tensor;
use super::{NamedParams, Optimizer, OptimizerState};

/// Adam with bias-corrected moment estimates.
///
/// m = β1·m + (1−β1)·g
/// v = β2·v + (1−β2)·g²
/// θ = θ − lr · m̂ / (√v̂ + ε)
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    step: u64,
    first_moment: BTreeMap<String, Tensor>,
    second_moment: BTreeMap<String, Tensor>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            first_moment: BTreeMap::new(),
            second_moment: BTreeMap::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut NamedParams<'_>) {
        self.step += 1;
        let bias1 = 1.0 - self.beta1.powi(self.step as i32);
        let bias2 = 1.0 - self.beta2.powi(self.step as i32);

        for (name, param) in params.iter_mut() {
            let shape = &param.value.shape;
            let m = self.first_moment.entry(name.clone()).or_insert_with(|| Tensor::zeros(shape));
            let v = self.second_moment.entry(name.clone()).or_insert_with(|| Tensor::zeros(shape));

            for i in 0..param.value.len() {
                let g = param.grad.data[i];
                m.data[i] = self.beta1 * m.data[i] + (1.0 - self.beta1) * g;
                v.data[i] = self.beta2 * v.data[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m.data[i] / bias1;
                let v_hat = v.data[i] / bias2;
                param.value.data[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
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
        OptimizerState::Adam {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            step: self.step,
            first_moment: self.first_moment.clone(),
            second_moment: self.second_moment.clone(),
        }
    }

    fn name(&self) -> &'static str {
        "Adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Param;
    use approx::assert_abs_diff_eq;

    #[test]
    fn first_step_moves_by_learning_rate() {
        // With bias correction the first update is lr · sign(g).
        let mut p = Param::new(Tensor::from_vec(&[2], vec![0.0, 0.0]));
        p.grad = Tensor::from_vec(&[2], vec![3.0, -0.5]);
        let mut adam = Adam::new(0.01);
        adam.step(&mut [("w".to_string(), &mut p)]);
        assert_abs_diff_eq!(p.value.data[0], -0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(p.value.data[1], 0.01, epsilon = 1e-6);
    }
}
