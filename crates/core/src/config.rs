use serde::Deserialize;
use std::path::Path;

use crate::error::{RecError, RecResult};
use crate::types::RatingRange;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `USERKNN__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// How neighbor ratings are aggregated into a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Query mean plus the similarity-weighted average of neighbor offsets
    /// from their own means.
    #[default]
    MeanCentered,
    /// Similarity-weighted average of raw neighbor ratings.
    WeightedAverage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default = "default_num_recs")]
    pub num_recs: usize,
    #[serde(default = "default_min_neighbors")]
    pub min_neighbors: usize,
    #[serde(default = "default_max_neighbors")]
    pub max_neighbors: usize,
    #[serde(default = "default_rating_min")]
    pub rating_min: f64,
    #[serde(default = "default_rating_max")]
    pub rating_max: f64,
    #[serde(default)]
    pub prediction_mode: PredictionMode,
    /// Score candidate items on the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
    /// Items need strictly more ratings than this to enter the popularity list.
    #[serde(default = "default_popularity_min_ratings")]
    pub popularity_min_ratings: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// Historical ratings CSV used when no path is given on the command line.
    #[serde(default)]
    pub ratings_path: Option<String>,
    /// Item metadata CSV (item id, title, genres) for genre-filtered lists.
    #[serde(default)]
    pub movies_path: Option<String>,
}

// Default functions
fn default_num_recs() -> usize {
    10
}
fn default_min_neighbors() -> usize {
    3
}
fn default_max_neighbors() -> usize {
    15
}
fn default_rating_min() -> f64 {
    0.5
}
fn default_rating_max() -> f64 {
    5.0
}
fn default_popularity_min_ratings() -> usize {
    20
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            num_recs: default_num_recs(),
            min_neighbors: default_min_neighbors(),
            max_neighbors: default_max_neighbors(),
            rating_min: default_rating_min(),
            rating_max: default_rating_max(),
            prediction_mode: PredictionMode::default(),
            parallel: false,
            popularity_min_ratings: default_popularity_min_ratings(),
        }
    }
}

impl RecommenderConfig {
    pub fn rating_range(&self) -> RecResult<RatingRange> {
        RatingRange::new(self.rating_min, self.rating_max)
    }

    pub fn validate(&self) -> RecResult<()> {
        if self.num_recs == 0 {
            return Err(RecError::Config("num_recs must be positive".to_string()));
        }
        validate_neighbor_bounds(self.min_neighbors, self.max_neighbors)
            .map_err(|e| RecError::Config(e.to_string()))?;
        self.rating_range()
            .map_err(|e| RecError::Config(e.to_string()))?;
        Ok(())
    }
}

/// Shared check for neighborhood bounds supplied by config or by a caller.
pub fn validate_neighbor_bounds(min_neighbors: usize, max_neighbors: usize) -> RecResult<()> {
    if min_neighbors == 0 {
        return Err(RecError::invalid("min_neighbors must be positive"));
    }
    if min_neighbors > max_neighbors {
        return Err(RecError::invalid(format!(
            "min_neighbors ({}) exceeds max_neighbors ({})",
            min_neighbors, max_neighbors
        )));
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from an optional config file, then environment
    /// variables (`USERKNN__RECOMMENDER__MIN_NEIGHBORS=5`).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("USERKNN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RecommenderConfig::default();
        assert_eq!(config.min_neighbors, 3);
        assert_eq!(config.max_neighbors, 15);
        assert_eq!(config.num_recs, 10);
        assert_eq!(config.prediction_mode, PredictionMode::MeanCentered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let config = RecommenderConfig {
            min_neighbors: 20,
            max_neighbors: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RecError::Config(_))));

        let config = RecommenderConfig {
            min_neighbors: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecommenderConfig {
            rating_min: 6.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_neighbor_bounds() {
        assert!(validate_neighbor_bounds(3, 3).is_ok());
        assert!(matches!(
            validate_neighbor_bounds(0, 3),
            Err(RecError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_neighbor_bounds(4, 3),
            Err(RecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[recommender]\nmin_neighbors = 10\nmax_neighbors = 50\n\
             prediction_mode = \"weighted_average\"\n\n\
             [data]\nratings_path = \"ratings.csv\"\nmovies_path = \"movies.csv\""
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.recommender.min_neighbors, 10);
        assert_eq!(config.recommender.max_neighbors, 50);
        assert_eq!(
            config.recommender.prediction_mode,
            PredictionMode::WeightedAverage
        );
        assert_eq!(config.recommender.num_recs, 10);
        assert_eq!(config.data.ratings_path.as_deref(), Some("ratings.csv"));
        assert_eq!(config.data.movies_path.as_deref(), Some("movies.csv"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
