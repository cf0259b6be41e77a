//! Aggregates a neighborhood into a predicted rating.

use userknn_core::{Prediction, PredictionMode};
use userknn_store::RatingStore;

use crate::neighborhood::{Neighborhood, ResolvedQuery};

pub struct Predictor<'a> {
    store: &'a RatingStore,
    mode: PredictionMode,
}

impl<'a> Predictor<'a> {
    pub fn new(store: &'a RatingStore, mode: PredictionMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> PredictionMode {
        self.mode
    }

    /// Predict the query's rating for the neighborhood's item.
    ///
    /// `MeanCentered`: `query_mean + Σ sᵢ (rᵢ − meanᵢ) / Σ |sᵢ|`.
    /// `WeightedAverage`: `Σ sᵢ rᵢ / Σ |sᵢ|`.
    ///
    /// Returns `None` when the neighborhood carries no weight or the query
    /// profile is empty; the item is then treated as insufficient.
    pub fn predict(
        &self,
        query: &ResolvedQuery<'_>,
        neighborhood: &Neighborhood,
    ) -> Option<Prediction> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for neighbor in neighborhood.iter() {
            let offset = match self.mode {
                PredictionMode::MeanCentered => {
                    neighbor.rating - self.store.user_mean(neighbor.user_id)?
                }
                PredictionMode::WeightedAverage => neighbor.rating,
            };
            weighted += neighbor.similarity * offset;
            total_weight += neighbor.similarity.abs();
        }

        if total_weight <= 0.0 || !total_weight.is_finite() {
            return None;
        }

        let aggregate = weighted / total_weight;
        let predicted_value = match self.mode {
            PredictionMode::MeanCentered => query.mean()? + aggregate,
            PredictionMode::WeightedAverage => aggregate,
        };

        Some(Prediction {
            item_id: neighborhood.item_id,
            predicted_value,
            support_count: neighborhood.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighborhood::NeighborhoodSelector;
    use userknn_core::{Rating, UserProfile};

    fn store() -> RatingStore {
        RatingStore::from_ratings(vec![
            Rating::new(1, 10, 5.0),
            Rating::new(1, 11, 3.0),
            Rating::new(2, 10, 5.0),
            Rating::new(2, 11, 3.0),
            Rating::new(3, 10, 1.0),
            Rating::new(3, 11, 3.0),
        ])
        .unwrap()
    }

    fn neighborhood_for(
        store: &RatingStore,
        query: &ResolvedQuery<'_>,
        item: i64,
    ) -> Neighborhood {
        NeighborhoodSelector::new(store)
            .neighbors_for(query, item, 2, 3)
            .neighborhood()
            .unwrap()
    }

    #[test]
    fn test_weighted_average() {
        let store = store();
        let profile: UserProfile = vec![(10, 4.0)].into_iter().collect();
        let query = ResolvedQuery::synthetic(&profile);
        let neighborhood = neighborhood_for(&store, &query, 11);

        let predictor = Predictor::new(&store, PredictionMode::WeightedAverage);
        let prediction = predictor.predict(&query, &neighborhood).unwrap();
        assert_eq!(prediction.item_id, 11);
        assert_eq!(prediction.support_count, 3);
        assert!((prediction.predicted_value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_centered() {
        let store = store();
        let profile: UserProfile = vec![(10, 4.0)].into_iter().collect();
        let query = ResolvedQuery::synthetic(&profile);
        let neighborhood = neighborhood_for(&store, &query, 11);

        // All three neighbors have similarity 1. Offsets on item 11 from
        // their means (4, 4, 2) are -1, -1, +1.
        let predictor = Predictor::new(&store, PredictionMode::MeanCentered);
        let prediction = predictor.predict(&query, &neighborhood).unwrap();
        assert!((prediction.predicted_value - (4.0 - 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_weights_follow_similarity() {
        // Query agrees with users 1 and 2 and only weakly with user 3.
        let store = RatingStore::from_ratings(vec![
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 1.0),
            Rating::new(1, 9, 5.0),
            Rating::new(2, 1, 4.0),
            Rating::new(2, 2, 2.0),
            Rating::new(2, 9, 5.0),
            Rating::new(3, 1, 4.0),
            Rating::new(3, 2, 3.0),
            Rating::new(3, 9, 1.0),
        ])
        .unwrap();
        let profile: UserProfile = vec![(1, 5.0), (2, 1.0)].into_iter().collect();
        let query = ResolvedQuery::synthetic(&profile);
        let neighborhood = NeighborhoodSelector::new(&store)
            .neighbors_for(&query, 9, 1, 3)
            .neighborhood()
            .unwrap();

        let predictor = Predictor::new(&store, PredictionMode::WeightedAverage);
        let prediction = predictor.predict(&query, &neighborhood).unwrap();
        let plain_mean = (5.0 + 5.0 + 1.0) / 3.0;
        assert!(prediction.predicted_value > plain_mean);
        assert!(prediction.predicted_value < 5.0);
    }
}
