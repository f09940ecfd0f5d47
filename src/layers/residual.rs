use crate::{math::tensor::Tensor, network::sequential::Sequential};
use super::{Layer, Param};

/// Identity shortcut around a shape-preserving body: `y = x + body(x)`.
pub struct Residual {
    pub body: Sequential,
}

impl Residual {
    pub fn new(body: Sequential) -> Residual {
        Residual { body }
    }
}

impl Layer for Residual {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let branch = self.body.forward(input);
        branch + input.clone()
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let mut grad = self.body.backward(grad_output);
        grad.add_assign(grad_output);
        grad
    }

    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        self.body.params_mut()
    }
}
