use crate::{
    activation::activation::ActivationFunction,
    math::tensor::{matmul, transpose, Tensor},
};
use super::{Layer, Param};

/// Fully-connected layer with a fused element-wise activation.
///
/// Input `[N, input_size]`, output `[N, size]`, `a = σ(xW + b)`.
#[derive(Debug)]
pub struct Dense {
    pub size: usize,
    pub input_size: usize,
    pub weights: Param,
    pub biases: Param,
    pub activator: ActivationFunction,
    input: Tensor,
    pre_neurons: Tensor, // pre-activation values (z = xW + b) needed for correct derivative
}

impl Dense {
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Dense {
        let weights = match activation {
            ActivationFunction::ReLU | ActivationFunction::LeakyReLU { .. } => {
                Tensor::he(&[input_size, size], input_size)
            }
            _ => Tensor::xavier(&[input_size, size], input_size),
        };

        Dense {
            size,
            input_size,
            weights: Param::new(weights),
            biases: Param::new(Tensor::zeros(&[size])),
            activator: activation,
            input: Tensor::default(),
            pre_neurons: Tensor::default(),
        }
    }
}

impl Layer for Dense {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let n = input.batch_size();
        assert_eq!(input.item_len(), self.input_size, "Dense input width mismatch");

        let mut z = matmul(&input.data, &self.weights.value.data, n, self.input_size, self.size);
        for row in z.chunks_mut(self.size) {
            for (v, b) in row.iter_mut().zip(&self.biases.value.data) {
                *v += b;
            }
        }
        let z = Tensor::from_vec(&[n, self.size], z);
        let a = z.map(|x| self.activator.function(x));

        self.input = input.reshape(&[n, self.input_size]);
        self.pre_neurons = z;
        a
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let n = self.input.batch_size();

        // Use pre-activation z so that derivative(z) = σ'(z) is computed correctly.
        // Element-wise (Hadamard) product: δ = error ⊙ σ'(z)
        let act = self.activator;
        let delta = self.pre_neurons.zip_map(grad_output, |z, g| g * act.derivative(z));

        let input_t = transpose(&self.input.data, n, self.input_size);
        let w_grad = matmul(&input_t, &delta.data, self.input_size, n, self.size);
        for (g, w) in self.weights.grad.data.iter_mut().zip(w_grad) {
            *g += w;
        }
        for row in delta.data.chunks(self.size) {
            for (g, d) in self.biases.grad.data.iter_mut().zip(row) {
                *g += d;
            }
        }

        let weights_t = transpose(&self.weights.value.data, self.input_size, self.size);
        let grad_input = matmul(&delta.data, &weights_t, n, self.size, self.input_size);
        Tensor::from_vec(&[n, self.input_size], grad_input)
    }

    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        vec![
            ("weight".to_string(), &mut self.weights),
            ("bias".to_string(), &mut self.biases),
        ]
    }
}
