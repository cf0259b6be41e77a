pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, PredictionMode, RecommenderConfig};
pub use error::{RecError, RecResult};
pub use types::{
    ItemId, Prediction, QueryIdentity, RankedList, Rating, RatingRange, UserId, UserProfile,
};
