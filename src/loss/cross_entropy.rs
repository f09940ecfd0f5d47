use crate::math::tensor::Tensor;

/// Categorical cross-entropy on raw logits, averaged over the batch.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Row-wise softmax of a `[N, classes]` logit tensor, shifted by the row
    /// maximum so `exp` cannot overflow.
    pub fn softmax(logits: &Tensor) -> Tensor {
        let classes = logits.item_len();
        let mut out = Vec::with_capacity(logits.len());
        for row in logits.data.chunks(classes) {
            let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = row.iter().map(|z| (z - max).exp()).collect();
            let sum: f64 = exps.iter().sum();
            out.extend(exps.into_iter().map(|e| e / sum));
        }
        Tensor::from_vec(&logits.shape, out)
    }

    /// Computes the scalar loss:
    ///   L = -mean_n log softmax(z_n)[t_n]
    pub fn loss(logits: &Tensor, targets: &[usize]) -> f64 {
        let classes = logits.item_len();
        assert_eq!(logits.batch_size(), targets.len(), "one target per row required");
        let total: f64 = logits
            .data
            .chunks(classes)
            .zip(targets)
            .map(|(row, &t)| {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let log_sum = row.iter().map(|z| (z - max).exp()).sum::<f64>().ln() + max;
                log_sum - row[t]
            })
            .sum();
        total / targets.len() as f64
    }

    /// Gradient w.r.t. the logits. Softmax and cross-entropy composed
    /// together simplify to:
    ///   ∂L/∂z_i = (softmax(z)_i - onehot_i) / N
    pub fn derivative(logits: &Tensor, targets: &[usize]) -> Tensor {
        let classes = logits.item_len();
        let n = targets.len() as f64;
        let mut grad = CrossEntropyLoss::softmax(logits);
        for (row, &t) in grad.data.chunks_mut(classes).zip(targets) {
            row[t] -= 1.0;
            for v in row.iter_mut() {
                *v /= n;
            }
        }
        grad
    }
}
