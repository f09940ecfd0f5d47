use crate::math::tensor::Tensor;
use super::{Layer, Param};

const EPS: f64 = 1e-5;

/// Instance normalisation: every (sample, channel) plane is normalised to
/// zero mean and unit variance over its own spatial extent, which strips
/// per-image contrast and colour statistics (i.e. "style").
///
/// With `affine` the normalised plane is rescaled by a learned per-channel
/// `gamma` and shifted by `beta`.
#[derive(Debug)]
pub struct InstanceNorm2d {
    pub channels: usize,
    pub gamma: Option<Param>,
    pub beta: Option<Param>,
    normalized: Tensor,
    inv_std: Vec<f64>,
}

impl InstanceNorm2d {
    pub fn new(channels: usize, affine: bool) -> InstanceNorm2d {
        let (gamma, beta) = if affine {
            (
                Some(Param::new(Tensor::full(&[channels], 1.0))),
                Some(Param::new(Tensor::zeros(&[channels]))),
            )
        } else {
            (None, None)
        };
        InstanceNorm2d {
            channels,
            gamma,
            beta,
            normalized: Tensor::default(),
            inv_std: Vec::new(),
        }
    }

    fn gamma_at(&self, channel: usize) -> f64 {
        self.gamma.as_ref().map_or(1.0, |g| g.value.data[channel])
    }
}

impl Layer for InstanceNorm2d {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        assert_eq!(input.shape[1], self.channels, "InstanceNorm2d channel mismatch");
        let hw = input.shape[2] * input.shape[3];
        let mut normalized = Vec::with_capacity(input.len());
        self.inv_std.clear();

        for plane in input.data.chunks(hw) {
            let mean = plane.iter().sum::<f64>() / hw as f64;
            let var = plane.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / hw as f64;
            let inv_std = 1.0 / (var + EPS).sqrt();
            normalized.extend(plane.iter().map(|x| (x - mean) * inv_std));
            self.inv_std.push(inv_std);
        }
        self.normalized = Tensor::from_vec(&input.shape, normalized);

        let mut out = self.normalized.clone();
        if let (Some(gamma), Some(beta)) = (&self.gamma, &self.beta) {
            for (p, plane) in out.data.chunks_mut(hw).enumerate() {
                let c = p % self.channels;
                for v in plane {
                    *v = *v * gamma.value.data[c] + beta.value.data[c];
                }
            }
        }
        out
    }

    fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        let hw = self.normalized.shape[2] * self.normalized.shape[3];
        let m = hw as f64;
        let mut grad = Vec::with_capacity(grad_output.len());

        for (p, (g_plane, x_hat)) in grad_output
            .data
            .chunks(hw)
            .zip(self.normalized.data.chunks(hw))
            .enumerate()
        {
            let c = p % self.channels;
            if let (Some(gamma), Some(beta)) = (self.gamma.as_mut(), self.beta.as_mut()) {
                gamma.grad.data[c] += g_plane.iter().zip(x_hat).map(|(g, x)| g * x).sum::<f64>();
                beta.grad.data[c] += g_plane.iter().sum::<f64>();
            }

            let scale = self.gamma_at(c);
            let d_hat: Vec<f64> = g_plane.iter().map(|g| g * scale).collect();
            let sum_d: f64 = d_hat.iter().sum();
            let sum_dx: f64 = d_hat.iter().zip(x_hat).map(|(d, x)| d * x).sum();
            let k = self.inv_std[p] / m;
            grad.extend(
                d_hat
                    .iter()
                    .zip(x_hat)
                    .map(|(d, x)| k * (m * d - sum_d - x * sum_dx)),
            );
        }

        Tensor::from_vec(&self.normalized.shape, grad)
    }

    fn params_mut(&mut self) -> Vec<(String, &mut Param)> {
        let mut params = Vec::new();
        if let Some(gamma) = self.gamma.as_mut() {
            params.push(("weight".to_string(), gamma));
        }
        if let Some(beta) = self.beta.as_mut() {
            params.push(("bias".to_string(), beta));
        }
        params
    }
}
