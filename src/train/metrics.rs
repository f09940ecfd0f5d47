use crate::score::score_value;

/// Accuracy counts and per-batch losses accumulated over one loop pass.
#[derive(Debug, Clone, Default)]
pub struct RunningMetrics {
    pub top1: usize,
    pub top5: usize,
    pub total: usize,
    losses: Vec<f64>,
    classification_losses: Vec<f64>,
    similarity_losses: Vec<f64>,
}

impl RunningMetrics {
    pub fn new() -> RunningMetrics {
        RunningMetrics::default()
    }

    pub fn record_scores(&mut self, top1: usize, top5: usize, total: usize) {
        self.top1 += top1;
        self.top5 += top5;
        self.total += total;
    }

    pub fn record_loss(&mut self, loss: f64) {
        self.losses.push(loss);
    }

    /// Tracks the two halves of a similarity-weighted loss separately.
    pub fn record_components(&mut self, classification: f64, similarity: f64) {
        self.classification_losses.push(classification);
        self.similarity_losses.push(similarity);
    }

    pub fn top1_accuracy(&self) -> f64 {
        score_value(self.top1, self.total)
    }

    pub fn top5_accuracy(&self) -> f64 {
        score_value(self.top5, self.total)
    }

    pub fn mean_loss(&self) -> f64 {
        mean(&self.losses)
    }

    pub fn mean_classification_loss(&self) -> f64 {
        mean(&self.classification_losses)
    }

    pub fn mean_similarity_loss(&self) -> f64 {
        mean(&self.similarity_losses)
    }

    /// Number of losses recorded so far.
    pub fn batches(&self) -> usize {
        self.losses.len()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accuracies_are_cumulative() {
        let mut m = RunningMetrics::new();
        m.record_scores(1, 2, 4);
        m.record_scores(3, 4, 4);
        assert_abs_diff_eq!(m.top1_accuracy(), 0.5);
        assert_abs_diff_eq!(m.top5_accuracy(), 0.75);
    }

    #[test]
    fn losses_average_per_batch() {
        let mut m = RunningMetrics::new();
        assert_eq!(m.mean_loss(), 0.0);
        m.record_loss(1.0);
        m.record_loss(3.0);
        m.record_components(0.5, 10.0);
        assert_abs_diff_eq!(m.mean_loss(), 2.0);
        assert_abs_diff_eq!(m.mean_similarity_loss(), 10.0);
        assert_eq!(m.batches(), 2);
    }
}
