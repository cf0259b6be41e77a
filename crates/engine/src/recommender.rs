//! Request-level entry point: validates a query, scores every unrated item
//! through neighborhood selection and prediction, and ranks the result.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use userknn_core::config::validate_neighbor_bounds;
use userknn_core::{
    ItemId, Prediction, QueryIdentity, RankedList, RatingRange, RecError, RecResult,
    RecommenderConfig, UserProfile,
};
use userknn_store::RatingStore;

use crate::combine::combine;
use crate::neighborhood::NeighborhoodSelector;
use crate::popular::{most_popular, GenreFilter, PopularItem};
use crate::predictor::Predictor;
use crate::ranker::rank;

pub const MODEL_VERSION: &str = "user-knn-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub query: QueryIdentity,
    /// Number of items to return; the configured `num_recs` when unset.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub min_neighbors: Option<usize>,
    #[serde(default)]
    pub max_neighbors: Option<usize>,
}

impl RecommendationRequest {
    pub fn new(query: impl Into<QueryIdentity>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            min_neighbors: None,
            max_neighbors: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub request_id: Uuid,
    pub items: RankedList,
    pub generated_at: DateTime<Utc>,
    pub model_version: String,
}

/// Shares one immutable rating store across any number of concurrent
/// requests. Every call builds its own similarity cache.
#[derive(Debug, Clone)]
pub struct Recommender {
    store: Arc<RatingStore>,
    config: RecommenderConfig,
    range: RatingRange,
}

impl Recommender {
    pub fn new(store: Arc<RatingStore>, config: RecommenderConfig) -> RecResult<Self> {
        config.validate()?;
        let range = config.rating_range()?;
        info!(
            users = store.num_users(),
            items = store.num_items(),
            mode = ?config.prediction_mode,
            parallel = config.parallel,
            "Recommender initialized"
        );
        Ok(Self {
            store,
            config,
            range,
        })
    }

    pub fn store(&self) -> &Arc<RatingStore> {
        &self.store
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    /// Top `k` unrated items for `query`, ranked by predicted rating.
    ///
    /// Items with fewer than `min_neighbors` positively similar raters are
    /// left out, so the list may be shorter than `k` or empty.
    pub fn recommend(
        &self,
        query: &QueryIdentity,
        k: usize,
        min_neighbors: usize,
        max_neighbors: usize,
    ) -> RecResult<RankedList> {
        let start = Instant::now();
        metrics::counter!("recommend.requests").increment(1);

        if k == 0 {
            return Err(RecError::invalid("k must be positive"));
        }
        validate_neighbor_bounds(min_neighbors, max_neighbors)?;
        if let QueryIdentity::SyntheticProfile(profile) = query {
            profile.validate(&self.range)?;
        }

        let selector = NeighborhoodSelector::new(&self.store);
        let resolved = selector.resolve(query)?;
        if resolved.mean().is_none() {
            debug!("Empty query profile, nothing to recommend");
            return Ok(RankedList::default());
        }

        let predictor = Predictor::new(&self.store, self.config.prediction_mode);
        let candidates: Vec<ItemId> = self
            .store
            .all_item_ids()
            .iter()
            .copied()
            .filter(|item_id| !resolved.profile().contains(*item_id))
            .collect();

        let score = |item_id: &ItemId| -> Option<Prediction> {
            let neighborhood = selector
                .neighbors_for(&resolved, *item_id, min_neighbors, max_neighbors)
                .neighborhood()?;
            predictor.predict(&resolved, &neighborhood)
        };
        let predictions: Vec<Prediction> = if self.config.parallel {
            candidates.par_iter().filter_map(score).collect()
        } else {
            candidates.iter().filter_map(score).collect()
        };

        let insufficient = candidates.len() - predictions.len();
        metrics::counter!("recommend.items_insufficient").increment(insufficient as u64);

        let scored = predictions.len();
        let ranked = rank(predictions, k)?;
        let cache = selector.cache_stats();
        let latency_us = start.elapsed().as_micros() as u64;
        metrics::histogram!("recommend.latency_us").record(latency_us as f64);

        debug!(
            user_id = ?resolved.user_id(),
            candidates = candidates.len(),
            scored,
            insufficient,
            returned = ranked.len(),
            cache_hits = cache.hits,
            cache_misses = cache.misses,
            latency_us,
            "Recommendations computed"
        );

        Ok(ranked)
    }

    /// `recommend` with every bound taken from the configuration.
    pub fn recommend_default(&self, query: &QueryIdentity) -> RecResult<RankedList> {
        self.recommend(
            query,
            self.config.num_recs,
            self.config.min_neighbors,
            self.config.max_neighbors,
        )
    }

    pub fn respond(&self, request: &RecommendationRequest) -> RecResult<RecommendationResponse> {
        let items = self.recommend(
            &request.query,
            request.limit.unwrap_or(self.config.num_recs),
            request.min_neighbors.unwrap_or(self.config.min_neighbors),
            request.max_neighbors.unwrap_or(self.config.max_neighbors),
        )?;

        Ok(RecommendationResponse {
            request_id: Uuid::new_v4(),
            items,
            generated_at: Utc::now(),
            model_version: MODEL_VERSION.to_string(),
        })
    }

    /// Popularity fallback using the configured rating-count threshold.
    pub fn most_popular(
        &self,
        k: usize,
        exclude: Option<&UserProfile>,
        genre: Option<GenreFilter<'_>>,
    ) -> RecResult<Vec<PopularItem>> {
        most_popular(
            &self.store,
            self.config.popularity_min_ratings,
            k,
            exclude,
            genre,
        )
    }

    /// Merge several profiles into one group profile.
    pub fn combine_profiles(&self, profiles: &[UserProfile]) -> UserProfile {
        combine(profiles)
    }
}
