//! userknn: user-based collaborative filtering recommendations from a
//! ratings CSV, for a stored user or for one or more personal rating sheets.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use userknn_core::{AppConfig, QueryIdentity, UserId, UserProfile};
use userknn_engine::{GenreFilter, RecommendationRequest, Recommender};
use userknn_store::{import_profile_csv, load_items_csv, load_ratings_csv};

#[derive(Parser, Debug)]
#[command(name = "userknn")]
#[command(about = "User-based k-nearest-neighbor recommendations")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "USERKNN_CONFIG")]
    config: Option<PathBuf>,

    /// Historical ratings CSV (overrides data.ratings_path)
    #[arg(long, global = true, env = "USERKNN__DATA__RATINGS_PATH")]
    ratings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recommend unrated items for a stored user or a group of rating sheets
    Recommend {
        /// Id of a user present in the ratings file
        #[arg(long, conflicts_with = "profile", required_unless_present = "profile")]
        user: Option<UserId>,

        /// Personal rating sheet (columns: item, ratings); repeat to
        /// recommend for a group
        #[arg(long)]
        profile: Vec<PathBuf>,

        /// Number of recommendations (overrides recommender.num_recs)
        #[arg(short, long)]
        k: Option<usize>,

        /// Minimum neighbors needed to score an item
        #[arg(long)]
        min_neighbors: Option<usize>,

        /// Maximum neighbors consulted per item
        #[arg(long)]
        max_neighbors: Option<usize>,

        /// Score candidate items in parallel
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },

    /// List the highest-rated items with enough ratings
    Popular {
        /// Items need more than this many ratings
        #[arg(long)]
        min_ratings: Option<usize>,

        /// Number of items to list
        #[arg(short, long, default_value_t = 10)]
        k: usize,

        /// Rating sheet whose items are left out of the list
        #[arg(long)]
        exclude: Option<PathBuf>,

        /// Item metadata CSV (overrides data.movies_path)
        #[arg(long)]
        movies: Option<PathBuf>,

        /// Only list items tagged with this genre, e.g. Action
        #[arg(long)]
        genre: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userknn=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;

    let ratings_path = cli
        .ratings
        .clone()
        .or_else(|| config.data.ratings_path.as_ref().map(PathBuf::from));
    let Some(ratings_path) = ratings_path else {
        bail!("no ratings file: pass --ratings or set data.ratings_path");
    };

    let output = match cli.command {
        Commands::Recommend {
            user,
            profile,
            k,
            min_neighbors,
            max_neighbors,
            parallel,
        } => {
            if parallel {
                config.recommender.parallel = true;
            }
            let recommender = build_recommender(&ratings_path, config)?;
            let query = match user {
                Some(user_id) => QueryIdentity::ExistingUser(user_id),
                None => QueryIdentity::SyntheticProfile(group_profile(&recommender, &profile)?),
            };

            let request = RecommendationRequest {
                query,
                limit: k,
                min_neighbors,
                max_neighbors,
            };
            let response = recommender.respond(&request)?;
            info!(
                request_id = %response.request_id,
                items = response.items.len(),
                "Recommendations ready"
            );
            serde_json::to_string_pretty(&response)?
        }
        Commands::Popular {
            min_ratings,
            k,
            exclude,
            movies,
            genre,
        } => {
            if let Some(min_ratings) = min_ratings {
                config.recommender.popularity_min_ratings = min_ratings;
            }
            let catalog = movies
                .or_else(|| config.data.movies_path.as_ref().map(PathBuf::from))
                .map(|path| {
                    load_items_csv(&path).with_context(|| {
                        format!("failed to load item metadata from {}", path.display())
                    })
                })
                .transpose()?;
            let filter = match (genre.as_deref(), catalog.as_ref()) {
                (Some(genre), Some(catalog)) => Some(GenreFilter::new(catalog, genre)),
                (Some(_), None) => {
                    bail!("--genre needs item metadata: pass --movies or set data.movies_path")
                }
                (None, _) => None,
            };

            let recommender = build_recommender(&ratings_path, config)?;
            let exclude = exclude
                .map(|path| read_sheet(&recommender, &path))
                .transpose()?;
            let popular = recommender.most_popular(k, exclude.as_ref(), filter)?;
            let listed: Vec<serde_json::Value> = popular
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "item_id": item.item_id,
                        "title": catalog.as_ref().and_then(|c| c.title(item.item_id)),
                        "mean_rating": item.mean_rating,
                        "rating_count": item.rating_count,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&listed)?
        }
    };

    println!("{}", output);
    Ok(())
}

/// An explicit config file must load; without one, environment variables are
/// layered over the defaults and a bad variable only costs a warning.
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        })),
    }
}

fn build_recommender(ratings_path: &Path, config: AppConfig) -> anyhow::Result<Recommender> {
    let store = load_ratings_csv(ratings_path)
        .with_context(|| format!("failed to load ratings from {}", ratings_path.display()))?;
    info!(
        users = store.num_users(),
        items = store.num_items(),
        ratings = store.num_ratings(),
        "Ratings loaded"
    );
    Ok(Recommender::new(Arc::new(store), config.recommender)?)
}

fn read_sheet(recommender: &Recommender, path: &Path) -> anyhow::Result<UserProfile> {
    let range = recommender.config().rating_range()?;
    import_profile_csv(path, &range)
        .with_context(|| format!("failed to import rating sheet {}", path.display()))
}

/// One sheet is used as is; several are merged into a group profile.
fn group_profile(recommender: &Recommender, paths: &[PathBuf]) -> anyhow::Result<UserProfile> {
    let profiles = paths
        .iter()
        .map(|path| read_sheet(recommender, path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if profiles.len() > 1 {
        info!(members = profiles.len(), "Combining rating sheets");
    }
    Ok(recommender.combine_profiles(&profiles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("userknn.toml");
        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("userknn.toml"));
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[recommender\nmin_neighbors = ").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_explicit_config_is_applied() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[recommender]\nnum_recs = 4").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.recommender.num_recs, 4);
    }
}
