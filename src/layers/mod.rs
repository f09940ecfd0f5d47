pub mod activation;
pub mod conv;
pub mod dense;
pub mod norm;
pub mod param;
pub mod pool;
pub mod residual;
pub mod shape;

use crate::math::tensor::Tensor;

pub use activation::Activation;
pub use conv::Conv2d;
pub use dense::Dense;
pub use norm::InstanceNorm2d;
pub use param::Param;
pub use pool::{GlobalAvgPool, MaxPool2d};
pub use residual::Residual;
pub use shape::{Flatten, Reshape, Upsample};

/// A differentiable building block.
///
/// `forward` caches whatever the backward pass needs; `backward` receives
/// ∂L/∂output for the most recent forward call, accumulates parameter
/// gradients into the layer's `Param`s and returns ∂L/∂input.
pub trait Layer {
    fn forward(&mut self, input: &Tensor) -> Tensor;

    fn backward(&mut self, grad_output: &Tensor) -> Tensor;

    /// Named trainable parameters, in a stable order.
    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        Vec::new()
    }
}
