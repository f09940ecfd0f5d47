use crate::{
    layers::{Layer, Param},
    math::tensor::Tensor,
};

/// Ordered chain of layers. Parameters are named `"<index>.<name>"`.
#[derive(Default)]
pub struct Sequential {
    pub layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    pub fn new() -> Sequential {
        Sequential { layers: Vec::new() }
    }

    /// Builder-style append.
    pub fn with<L: Layer + 'static>(mut self, layer: L) -> Sequential {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Layer for Sequential {
    /// Forward pass; every layer caches what it needs for backprop.
    fn forward(&mut self, input: &Tensor) -> Tensor {
        let mut current = input.clone();
        for layer in &mut self.layers {
            current = layer.forward(&current);
        }
        current
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
        grad
    }

    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .params_mut()
                    .into_iter()
                    .map(move |(name, p)| (format!("{i}.{name}"), p))
            })
            .collect()
    }
}

/// Prefixes every parameter name with `scope.`.
pub fn scoped<'a>(scope: &str, params: Vec<(String, &'a mut Param)>) -> Vec<(String, &'a mut Param)> {
    params
        .into_iter()
        .map(|(name, p)| (format!("{scope}.{name}"), p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{activation::ActivationFunction, layers::{Activation, Dense, Residual}};

    #[test]
    fn parameters_are_named_by_position() {
        let mut net = Sequential::new()
            .with(Dense::new(4, 3, ActivationFunction::ReLU))
            .with(Activation::relu())
            .with(Residual::new(Sequential::new().with(Dense::new(4, 4, ActivationFunction::Identity))));
        let names: Vec<String> = net.params_mut().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["0.weight", "0.bias", "2.0.weight", "2.0.bias"]);
    }
}
