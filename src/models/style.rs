use crate::math::tensor::{matmul, transpose, Tensor};

/// Style spread of a feature batch.
///
/// Each sample's Gram matrix `G_b = F_b F_bᵀ / HW` summarises its texture
/// statistics; the distance is the mean squared deviation of the Gram
/// matrices from their batch average, normalised by `C²`. It is zero when
/// all images in the batch share the same style statistics.
#[derive(Debug, Default)]
pub struct StyleDistance {
    features: Tensor,
    deviations: Vec<Vec<f64>>,
}

impl StyleDistance {
    pub fn new() -> StyleDistance {
        StyleDistance::default()
    }

    pub fn forward(&mut self, features: &Tensor) -> f64 {
        let (n, c) = (features.shape[0], features.shape[1]);
        let hw = features.item_len() / c;

        let grams: Vec<Vec<f64>> = (0..n)
            .map(|b| {
                let f = features.item(b);
                let f_t = transpose(f, c, hw);
                matmul(f, &f_t, c, hw, c).into_iter().map(|v| v / hw as f64).collect()
            })
            .collect();

        let mut mean = vec![0.0; c * c];
        for g in &grams {
            for (m, v) in mean.iter_mut().zip(g) {
                *m += v / n as f64;
            }
        }

        self.deviations = grams
            .into_iter()
            .map(|g| g.iter().zip(&mean).map(|(v, m)| v - m).collect())
            .collect();
        self.features = features.clone();

        let total: f64 = self.deviations.iter().flatten().map(|d| d * d).sum();
        total / (n * c * c) as f64
    }

    /// Gradient of `grad · distance` w.r.t. the features of the last forward.
    pub fn backward(&self, grad: f64) -> Tensor {
        let (n, c) = (self.features.shape[0], self.features.shape[1]);
        let hw = self.features.item_len() / c;
        // ∂D/∂G_b = 2 (G_b − Ḡ) / (N C²); the Ḡ path sums to zero over b.
        // ∂D/∂F_b = 2 ∂D/∂G_b F_b / HW since ∂D/∂G_b is symmetric.
        let scale = grad * 4.0 / ((n * c * c) as f64 * hw as f64);

        let mut out = Vec::with_capacity(self.features.len());
        for (b, dev) in self.deviations.iter().enumerate() {
            let g = matmul(dev, self.features.item(b), c, c, hw);
            out.extend(g.into_iter().map(|v| v * scale));
        }
        Tensor::from_vec(&self.features.shape, out)
    }
}
