use crate::{activation::activation::ActivationFunction, math::tensor::Tensor};
use super::Layer;

/// Stand-alone element-wise activation, used between convolutions.
#[derive(Debug)]
pub struct Activation {
    pub function: ActivationFunction,
    pre: Tensor,
}

impl Activation {
    pub fn new(function: ActivationFunction) -> Activation {
        Activation { function, pre: Tensor::default() }
    }

    pub fn relu() -> Activation {
        Activation::new(ActivationFunction::ReLU)
    }
}

impl Layer for Activation {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.pre = input.clone();
        input.map(|x| self.function.function(x))
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let f = self.function;
        self.pre.zip_map(grad_output, |z, g| g * f.derivative(z))
    }
}
