use crate::math::tensor::Tensor;

/// Indices of the `k` largest entries of every row of a `[N, classes]`
/// tensor, highest first. Ties go to the lower class index; a positive
/// NaN ranks above every number.
pub fn top_k(logits: &Tensor, k: usize) -> Vec<Vec<usize>> {
    let classes = logits.item_len();
    let k = k.min(classes);
    logits
        .data
        .chunks(classes)
        .map(|row| {
            let mut order: Vec<usize> = (0..classes).collect();
            order.sort_by(|&a, &b| row[b].total_cmp(&row[a]).then(a.cmp(&b)));
            order.truncate(k);
            order
        })
        .collect()
}

/// Counts correct predictions in one batch.
///
/// Returns `(top1, top5, total)`: rank-0 hits, hits anywhere in the row,
/// and the number of rows.
pub fn score(predicted: &[Vec<usize>], targets: &[usize]) -> (usize, usize, usize) {
    assert_eq!(predicted.len(), targets.len(), "one prediction row per target required");
    let mut top1 = 0;
    let mut top5 = 0;
    for (row, target) in predicted.iter().zip(targets) {
        if row.first() == Some(target) {
            top1 += 1;
        }
        if row.iter().take(5).any(|p| p == target) {
            top5 += 1;
        }
    }
    (top1, top5, targets.len())
}

/// `correct / total`, or zero before anything has been seen.
pub fn score_value(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;

    #[test]
    fn rank_zero_hit_counts_for_both() {
        assert_eq!(score(&[vec![3, 1, 2, 4, 5]], &[3]), (1, 1, 1));
    }

    #[test]
    fn hit_outside_rank_zero_counts_for_top5_only() {
        assert_eq!(score(&[vec![1, 2, 3, 4, 5]], &[3]), (0, 1, 1));
    }

    #[test]
    fn top_k_orders_by_score_then_index() {
        let logits = Tensor::from_vec(&[1, 6], vec![0.1, 0.9, 0.5, 0.5, -1.0, 0.3]);
        assert_eq!(top_k(&logits, 5), vec![vec![1, 2, 3, 5, 0]]);
    }

    #[test]
    fn diverged_logits_still_rank() {
        let mut logits = Tensor::from_vec(&[8, 64], (0..512).map(|i| (i % 64) as f64).collect());
        for (i, v) in logits.data.iter_mut().enumerate() {
            if i % 3 == 0 {
                *v = f64::NAN;
            }
        }
        let ranked = top_k(&logits, 5);
        assert_eq!(ranked.len(), 8);
        assert!(ranked.iter().all(|row| row.len() == 5));
        // Row 0 has NaN at 0, 3, 6 ...; NaNs come first, lowest index first.
        assert_eq!(ranked[0], vec![0, 3, 6, 9, 12]);

        let clean = Tensor::from_vec(&[1, 4], vec![f64::NAN, 2.0, 5.0, f64::NAN]);
        assert_eq!(top_k(&clean, 4), vec![vec![0, 3, 2, 1]]);
    }

    #[test]
    fn score_value_of_empty_is_zero() {
        assert_eq!(score_value(0, 0), 0.0);
        assert_eq!(score_value(3, 4), 0.75);
    }

    fn rows_and_targets() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
        proptest::collection::vec(
            (Just((0..10usize).collect::<Vec<_>>()).prop_shuffle(), 0..10usize),
            1..32,
        )
        .prop_map(|pairs| {
            let (rows, targets): (Vec<Vec<usize>>, Vec<usize>) = pairs
                .into_iter()
                .map(|(mut perm, t)| {
                    perm.truncate(5);
                    (perm, t)
                })
                .unzip();
            (rows, targets)
        })
    }

    proptest! {
        #[test]
        fn top5_dominates_top1((rows, targets) in rows_and_targets()) {
            let (top1, top5, total) = score(&rows, &targets);
            prop_assert!(top1 <= top5);
            prop_assert!(top5 <= total);
            prop_assert_eq!(total, targets.len());
        }

        #[test]
        fn invariant_to_row_order((rows, targets) in rows_and_targets(), seed in any::<u64>()) {
            use rand::SeedableRng;
            let mut pairs: Vec<_> = rows.iter().cloned().zip(targets.iter().copied()).collect();
            pairs.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed));
            let (shuffled_rows, shuffled_targets): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
            prop_assert_eq!(score(&rows, &targets), score(&shuffled_rows, &shuffled_targets));
        }
    }
}
