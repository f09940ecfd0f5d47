use super::NamedParams;

/// Clip gradients by global norm.
///
/// Computes the norm over every gradient together and, when it exceeds
/// `max_norm`, rescales all gradients by `max_norm / (norm + 1e-6)`.
/// Returns the norm measured before clipping.
pub fn clip_grad_norm(params: &mut NamedParams<'_>, max_norm: f64) -> f64 {
    let total_norm = params
        .iter()
        .map(|(_, p)| p.grad.norm_squared())
        .sum::<f64>()
        .sqrt();

    let clip_coef = max_norm / (total_norm + 1e-6);
    if clip_coef < 1.0 {
        for (_, p) in params.iter_mut() {
            p.grad.scale_in_place(clip_coef);
        }
    }

    total_norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{layers::Param, math::tensor::Tensor};
    use approx::assert_abs_diff_eq;

    fn param_with_grad(grad: Vec<f64>) -> Param {
        let mut p = Param::new(Tensor::zeros(&[grad.len()]));
        p.grad = Tensor::from_vec(&[grad.len()], grad);
        p
    }

    #[test]
    fn small_gradients_are_untouched() {
        let mut a = param_with_grad(vec![0.1, 0.2]);
        let mut b = param_with_grad(vec![0.1]);
        let norm = clip_grad_norm(&mut [("a".into(), &mut a), ("b".into(), &mut b)], 1.0);
        assert_abs_diff_eq!(norm, 0.06f64.sqrt(), epsilon = 1e-12);
        assert_eq!(a.grad.data, vec![0.1, 0.2]);
    }

    #[test]
    fn large_gradients_are_scaled_to_the_ceiling() {
        let mut a = param_with_grad(vec![30.0, 40.0]);
        let norm = clip_grad_norm(&mut [("a".into(), &mut a)], 5.0);
        assert_abs_diff_eq!(norm, 50.0);
        assert_abs_diff_eq!(a.grad.norm_squared().sqrt(), 5.0, epsilon = 1e-6);
    }
}
