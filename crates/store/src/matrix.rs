//! Sparse user×item rating matrix.
//!
//! Ratings are indexed both by user (for profile lookups and means) and by
//! item (for "who rated this" queries). The store is built once through
//! [`RatingStoreBuilder`] and is immutable afterwards, so it can be shared
//! behind an `Arc` by any number of concurrent requests.

use std::collections::{BTreeSet, HashMap};

use tracing::info;
use userknn_core::{ItemId, Rating, RecError, RecResult, UserId, UserProfile};

/// Rating count and mean for a single item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemStats {
    pub count: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    by_user: HashMap<UserId, UserProfile>,
    user_means: HashMap<UserId, f64>,
    /// item -> users who rated it, ascending.
    by_item: HashMap<ItemId, BTreeSet<UserId>>,
    item_ids: BTreeSet<ItemId>,
    num_ratings: usize,
}

impl RatingStore {
    pub fn builder() -> RatingStoreBuilder {
        RatingStoreBuilder::new()
    }

    pub fn from_ratings<I>(ratings: I) -> RecResult<Self>
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut builder = RatingStoreBuilder::new();
        for rating in ratings {
            builder.add(rating)?;
        }
        Ok(builder.build())
    }

    /// All ratings of `user_id`. Fails with `NotFound` for an unknown user.
    pub fn ratings_for(&self, user_id: UserId) -> RecResult<&UserProfile> {
        self.by_user
            .get(&user_id)
            .ok_or(RecError::NotFound { user_id })
    }

    /// Users who rated `item_id`, in ascending id order. Empty for an
    /// unknown item.
    pub fn users_who_rated(&self, item_id: ItemId) -> impl Iterator<Item = UserId> + '_ {
        self.by_item
            .get(&item_id)
            .into_iter()
            .flat_map(|users| users.iter().copied())
    }

    pub fn num_raters(&self, item_id: ItemId) -> usize {
        self.by_item.get(&item_id).map_or(0, BTreeSet::len)
    }

    pub fn all_item_ids(&self) -> &BTreeSet<ItemId> {
        &self.item_ids
    }

    pub fn rating(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        self.by_user.get(&user_id)?.get(item_id)
    }

    pub fn user_mean(&self, user_id: UserId) -> Option<f64> {
        self.user_means.get(&user_id).copied()
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn item_stats(&self, item_id: ItemId) -> Option<ItemStats> {
        let raters = self.by_item.get(&item_id)?;
        let sum: f64 = raters
            .iter()
            .filter_map(|user| self.rating(*user, item_id))
            .sum();
        Some(ItemStats {
            count: raters.len(),
            mean: sum / raters.len() as f64,
        })
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.num_ratings
    }

    pub fn is_empty(&self) -> bool {
        self.num_ratings == 0
    }
}

/// Accumulates ratings and enforces one rating per (user, item) pair.
#[derive(Debug, Default)]
pub struct RatingStoreBuilder {
    by_user: HashMap<UserId, UserProfile>,
    num_ratings: usize,
}

impl RatingStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rating: Rating) -> RecResult<()> {
        if !rating.value.is_finite() {
            return Err(RecError::invalid(format!(
                "rating of user {} for item {} is not a finite number",
                rating.user_id, rating.item_id
            )));
        }

        let profile = self.by_user.entry(rating.user_id).or_default();
        if profile.contains(rating.item_id) {
            return Err(RecError::invalid(format!(
                "duplicate rating of user {} for item {}",
                rating.user_id, rating.item_id
            )));
        }
        profile.insert(rating.item_id, rating.value);
        self.num_ratings += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.num_ratings
    }

    pub fn is_empty(&self) -> bool {
        self.num_ratings == 0
    }

    pub fn build(self) -> RatingStore {
        let mut by_item: HashMap<ItemId, BTreeSet<UserId>> = HashMap::new();
        let mut user_means = HashMap::with_capacity(self.by_user.len());

        for (user_id, profile) in &self.by_user {
            for item_id in profile.item_ids() {
                by_item.entry(item_id).or_default().insert(*user_id);
            }
            if let Some(mean) = profile.mean() {
                user_means.insert(*user_id, mean);
            }
        }

        let item_ids: BTreeSet<ItemId> = by_item.keys().copied().collect();

        info!(
            users = self.by_user.len(),
            items = item_ids.len(),
            ratings = self.num_ratings,
            "Rating store built"
        );

        RatingStore {
            by_user: self.by_user,
            user_means,
            by_item,
            item_ids,
            num_ratings: self.num_ratings,
        }
    }
}
