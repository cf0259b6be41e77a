//! Top-K ranking of predictions.

use userknn_core::{Prediction, RankedList, RecError, RecResult};

/// Sort descending by predicted value (ascending item id on ties) and keep
/// the first `k`. Fails with `InvalidArgument` when `k` is zero.
pub fn rank(mut predictions: Vec<Prediction>, k: usize) -> RecResult<RankedList> {
    if k == 0 {
        return Err(RecError::invalid("k must be positive"));
    }

    if predictions.len() > k {
        predictions.select_nth_unstable_by(k - 1, Prediction::ranking_order);
        predictions.truncate(k);
    }
    predictions.sort_by(Prediction::ranking_order);

    Ok(RankedList::from_ranked(predictions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(item_id: i64, predicted_value: f64) -> Prediction {
        Prediction {
            item_id,
            predicted_value,
            support_count: 3,
        }
    }

    #[test]
    fn test_sorts_and_truncates() {
        let predictions = vec![
            prediction(1, 3.0),
            prediction(2, 4.5),
            prediction(3, 2.0),
            prediction(4, 4.0),
            prediction(5, 5.0),
        ];
        let ranked = rank(predictions, 3).unwrap();
        assert_eq!(ranked.item_ids(), vec![5, 2, 4]);
    }

    #[test]
    fn test_ties_break_on_item_id() {
        let predictions = vec![
            prediction(9, 4.0),
            prediction(3, 4.0),
            prediction(7, 4.0),
            prediction(1, 2.0),
        ];
        let ranked = rank(predictions.clone(), 2).unwrap();
        assert_eq!(ranked.item_ids(), vec![3, 7]);

        let all = rank(predictions, 10).unwrap();
        assert_eq!(all.item_ids(), vec![3, 7, 9, 1]);
    }

    #[test]
    fn test_k_larger_than_input() {
        let ranked = rank(vec![prediction(1, 1.0)], 5).unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(rank(Vec::new(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_k_is_invalid() {
        let err = rank(vec![prediction(1, 1.0)], 0).unwrap_err();
        assert!(matches!(err, RecError::InvalidArgument(_)));
    }
}
