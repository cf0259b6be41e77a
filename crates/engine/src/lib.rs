//! User-user collaborative filtering: similarity, neighborhood selection,
//! rating prediction, top-K ranking and group profile merging.

pub mod cache;
pub mod combine;
pub mod neighborhood;
pub mod popular;
pub mod predictor;
pub mod ranker;
pub mod recommender;
pub mod similarity;

pub use cache::{CacheStats, SimilarityCache};
pub use combine::combine;
pub use neighborhood::{Neighbor, Neighborhood, NeighborhoodSelector, ResolvedQuery, Selection};
pub use popular::{most_popular, GenreFilter, PopularItem};
pub use predictor::Predictor;
pub use ranker::rank;
pub use recommender::{RecommendationRequest, RecommendationResponse, Recommender, MODEL_VERSION};
pub use similarity::SimilarityEngine;
