use crate::math::tensor::Tensor;

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²) over every element.
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> f64 {
        assert_eq!(predicted.len(), expected.len(), "Tensors are of incorrect sizes");
        let n = predicted.len() as f64;
        predicted.data.iter().zip(&expected.data)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n
    }

    /// Per-element gradient: 2 (predicted - expected) / n
    pub fn derivative(predicted: &Tensor, expected: &Tensor) -> Tensor {
        let n = predicted.len() as f64;
        let data = predicted.data.iter().zip(&expected.data)
            .map(|(a, b)| 2.0 * (a - b) / n)
            .collect();
        Tensor::from_vec(&predicted.shape, data)
    }
}
