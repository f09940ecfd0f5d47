use crate::math::tensor::Tensor;
use super::mse::MseLoss;

/// Reconstruction + latent regularisation terms of a variational autoencoder.
pub struct VaeLoss;

/// Gradients of the composed autoencoder loss w.r.t. the model outputs.
pub struct VaeGrad {
    pub reconstruction: Tensor,
    pub mu: Tensor,
    pub logvar: Tensor,
}

impl VaeLoss {
    /// Returns `(mse, kl)` where
    ///   kl = -0.5 · Σ (1 + logvar - mu² - exp(logvar))
    /// summed over the whole batch.
    pub fn loss(reconstruction: &Tensor, target: &Tensor, mu: &Tensor, logvar: &Tensor) -> (f64, f64) {
        let mse = MseLoss::loss(reconstruction, target);
        let kl = -0.5
            * mu.data.iter().zip(&logvar.data)
                .map(|(m, lv)| 1.0 + lv - m * m - lv.exp())
                .sum::<f64>();
        (mse, kl)
    }

    /// Gradient of `mse + kl_scale · kl`.
    ///
    /// `kl_scale` is zero whenever the KL term was clamped to its floor or
    /// the annealing weight is still zero.
    pub fn derivative(
        reconstruction: &Tensor,
        target: &Tensor,
        mu: &Tensor,
        logvar: &Tensor,
        kl_scale: f64,
    ) -> VaeGrad {
        VaeGrad {
            reconstruction: MseLoss::derivative(reconstruction, target),
            mu: mu.map(|m| kl_scale * m),
            logvar: logvar.map(|lv| kl_scale * 0.5 * (lv.exp() - 1.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn kl_is_zero_for_standard_normal_posterior() {
        let x = Tensor::full(&[1, 3, 2, 2], 0.5);
        let (mse, kl) = VaeLoss::loss(&x, &x, &Tensor::zeros(&[1, 4]), &Tensor::zeros(&[1, 4]));
        assert_abs_diff_eq!(mse, 0.0);
        assert_abs_diff_eq!(kl, 0.0);
    }

    #[test]
    fn kl_gradient_matches_finite_difference() {
        let x = Tensor::zeros(&[1, 1]);
        let mu = Tensor::from_vec(&[1, 2], vec![0.3, -0.7]);
        let logvar = Tensor::from_vec(&[1, 2], vec![0.2, -0.4]);
        let grad = VaeLoss::derivative(&x, &x, &mu, &logvar, 1.0);

        let h = 1e-6;
        let kl = |lv: &Tensor| VaeLoss::loss(&x, &x, &mu, lv).1;
        let mut plus = logvar.clone();
        plus.data[1] += h;
        let mut minus = logvar.clone();
        minus.data[1] -= h;
        assert_abs_diff_eq!(grad.logvar.data[1], (kl(&plus) - kl(&minus)) / (2.0 * h), epsilon = 1e-6);
    }
}
