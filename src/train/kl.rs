/// Linear warm-up of the KL term's weight over one loop pass.
///
/// The weight stays at zero for the first 1% of batches, then grows by
/// `1 / (batches / 2)` after every batch until it reaches one. A fresh
/// schedule is built on every loop call, so the ramp restarts each epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct KlAnnealing {
    pub init: f64,
    pub step: f64,
    pub max: f64,
    weight: f64,
}

impl KlAnnealing {
    pub fn new(batch_count: usize) -> KlAnnealing {
        let half = batch_count / 2;
        let step = if half == 0 { 1.0 } else { 1.0 / half as f64 };
        KlAnnealing {
            init: 0.01 * batch_count as f64,
            step,
            max: 1.0,
            weight: 0.0,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Called after batch `batch_index` has been scored.
    pub fn advance(&mut self, batch_index: usize) {
        if batch_index as f64 > self.init && self.weight < self.max {
            self.weight = (self.weight + self.step).clamp(0.0, self.max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn ramps_over_half_the_batches() {
        let mut kl = KlAnnealing::new(10);
        assert_abs_diff_eq!(kl.step, 0.2);
        kl.advance(0);
        assert_eq!(kl.weight(), 0.0);
        for i in 1..=5 {
            kl.advance(i);
        }
        assert_abs_diff_eq!(kl.weight(), 1.0, epsilon = 1e-9);
        kl.advance(6);
        assert_abs_diff_eq!(kl.weight(), 1.0);
    }

    #[test]
    fn single_batch_loader_has_unit_step() {
        let kl = KlAnnealing::new(1);
        assert_eq!(kl.step, 1.0);
    }

    proptest! {
        #[test]
        fn weight_is_monotone_and_bounded(batches in 1usize..500) {
            let mut kl = KlAnnealing::new(batches);
            let mut previous = kl.weight();
            for i in 0..batches {
                kl.advance(i);
                let w = kl.weight();
                prop_assert!(w >= previous);
                prop_assert!((0.0..=1.0).contains(&w));
                previous = w;
            }
        }
    }
}
