//! Non-personalized baseline: items ranked by mean rating.

use serde::{Deserialize, Serialize};
use tracing::debug;
use userknn_core::{ItemId, RecError, RecResult, UserProfile};
use userknn_store::{ItemCatalog, RatingStore};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopularItem {
    pub item_id: ItemId,
    pub mean_rating: f64,
    pub rating_count: usize,
}

/// Restricts a popularity list to one genre of an item catalog.
#[derive(Debug, Clone, Copy)]
pub struct GenreFilter<'a> {
    pub catalog: &'a ItemCatalog,
    pub genre: &'a str,
}

impl<'a> GenreFilter<'a> {
    pub fn new(catalog: &'a ItemCatalog, genre: &'a str) -> Self {
        Self { catalog, genre }
    }

    /// Items missing from the catalog never match.
    pub fn matches(&self, item_id: ItemId) -> bool {
        self.catalog.has_genre(item_id, self.genre)
    }
}

/// Top `k` items by mean rating among items with more than `min_ratings`
/// ratings. Ties go to the item with more ratings, then the lower item id.
/// Items present in `exclude` are skipped, and with a `genre` filter only
/// items tagged with that genre are kept.
pub fn most_popular(
    store: &RatingStore,
    min_ratings: usize,
    k: usize,
    exclude: Option<&UserProfile>,
    genre: Option<GenreFilter<'_>>,
) -> RecResult<Vec<PopularItem>> {
    if k == 0 {
        return Err(RecError::invalid("k must be positive"));
    }

    let mut items: Vec<PopularItem> = store
        .all_item_ids()
        .iter()
        .filter(|item_id| !exclude.is_some_and(|profile| profile.contains(**item_id)))
        .filter(|item_id| genre.map_or(true, |filter| filter.matches(**item_id)))
        .filter_map(|&item_id| {
            let stats = store.item_stats(item_id)?;
            (stats.count > min_ratings).then_some(PopularItem {
                item_id,
                mean_rating: stats.mean,
                rating_count: stats.count,
            })
        })
        .collect();

    items.sort_by(|a, b| {
        b.mean_rating
            .total_cmp(&a.mean_rating)
            .then_with(|| b.rating_count.cmp(&a.rating_count))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
    debug!(
        eligible = items.len(),
        min_ratings,
        genre = genre.map(|filter| filter.genre),
        "Popularity ranking computed"
    );
    items.truncate(k);

    Ok(items)
}
