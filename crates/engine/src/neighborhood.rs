//! Neighborhood selection for a single candidate item.
//!
//! Candidates are the users who rated the item (minus the query user). Only
//! users with a defined, strictly positive similarity are eligible. The best
//! `max_neighbors` are kept, ordered by descending similarity with ties going
//! to the lower user id; fewer than `min_neighbors` makes the item
//! insufficient.

use serde::Serialize;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::BinaryHeap;
use std::hash::{Hash, Hasher};

use userknn_core::{ItemId, QueryIdentity, RecResult, UserId, UserProfile};
use userknn_store::RatingStore;

use crate::cache::{CacheStats, SimilarityCache};
use crate::similarity::SimilarityEngine;

/// A query identity turned into a uniform profile.
#[derive(Debug, Clone)]
pub struct ResolvedQuery<'a> {
    user_id: Option<UserId>,
    profile: Cow<'a, UserProfile>,
    mean: Option<f64>,
    fingerprint: u64,
}

impl<'a> ResolvedQuery<'a> {
    /// A profile that is not in the rating store.
    pub fn synthetic(profile: &'a UserProfile) -> Self {
        Self::build(None, Cow::Borrowed(profile))
    }

    fn build(user_id: Option<UserId>, profile: Cow<'a, UserProfile>) -> Self {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        for (item, value) in profile.iter() {
            item.hash(&mut hasher);
            value.to_bits().hash(&mut hasher);
        }
        Self {
            user_id,
            mean: profile.mean(),
            fingerprint: hasher.finish(),
            profile,
        }
    }

    /// The store user this query came from; `None` for a synthetic profile.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// One neighbor consulted for a candidate item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
    /// The neighbor's rating of the candidate item.
    pub rating: f64,
}

/// Heap entry where "greater" means a worse neighbor, so the heap root is the
/// first one to evict.
#[derive(Debug, Clone, Copy)]
struct Ranked(Neighbor);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .similarity
            .total_cmp(&self.0.similarity)
            .then_with(|| self.0.user_id.cmp(&other.0.user_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighborhood {
    pub item_id: ItemId,
    neighbors: Vec<Neighbor>,
}

impl Neighborhood {
    /// Neighbors best first.
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Neighbor> {
        self.neighbors.iter()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Outcome of neighbor selection for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected(Neighborhood),
    /// Fewer than `min_neighbors` eligible users.
    Insufficient { eligible: usize },
}

impl Selection {
    pub fn neighborhood(self) -> Option<Neighborhood> {
        match self {
            Selection::Selected(neighborhood) => Some(neighborhood),
            Selection::Insufficient { .. } => None,
        }
    }
}

pub struct NeighborhoodSelector<'a> {
    store: &'a RatingStore,
    similarity: SimilarityEngine<'a>,
    cache: SimilarityCache,
}

impl<'a> NeighborhoodSelector<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self {
            store,
            similarity: SimilarityEngine::new(store),
            cache: SimilarityCache::with_capacity(store.num_users()),
        }
    }

    /// Turn a query identity into a profile. Fails with `NotFound` for an
    /// existing-user query the store does not know.
    pub fn resolve<'q>(&self, identity: &'q QueryIdentity) -> RecResult<ResolvedQuery<'q>>
    where
        'a: 'q,
    {
        match identity {
            QueryIdentity::ExistingUser(user_id) => {
                let profile = self.store.ratings_for(*user_id)?;
                Ok(ResolvedQuery::build(Some(*user_id), Cow::Borrowed(profile)))
            }
            QueryIdentity::SyntheticProfile(profile) => Ok(ResolvedQuery::synthetic(profile)),
        }
    }

    /// Similarity of the query to `user_id`, memoized for this selector.
    pub fn similarity_to(&self, query: &ResolvedQuery<'_>, user_id: UserId) -> Option<f64> {
        let mean = query.mean()?;
        self.cache
            .get_or_compute(query.fingerprint(), user_id, || {
                self.similarity
                    .similarity_with_mean(query.profile(), mean, user_id)
            })
    }

    pub fn neighbors_for(
        &self,
        query: &ResolvedQuery<'_>,
        item_id: ItemId,
        min_neighbors: usize,
        max_neighbors: usize,
    ) -> Selection {
        let num_raters = self.store.num_raters(item_id);
        if num_raters < min_neighbors || max_neighbors == 0 {
            return Selection::Insufficient { eligible: 0 };
        }

        let mut top: BinaryHeap<Ranked> =
            BinaryHeap::with_capacity(max_neighbors.min(num_raters));
        let mut eligible = 0usize;

        for user_id in self.store.users_who_rated(item_id) {
            if Some(user_id) == query.user_id() {
                continue;
            }
            let similarity = match self.similarity_to(query, user_id) {
                Some(similarity) if similarity > 0.0 => similarity,
                _ => continue,
            };
            let rating = match self.store.rating(user_id, item_id) {
                Some(rating) => rating,
                None => continue,
            };
            eligible += 1;

            let candidate = Ranked(Neighbor {
                user_id,
                similarity,
                rating,
            });
            if top.len() < max_neighbors {
                top.push(candidate);
            } else if let Some(mut worst) = top.peek_mut() {
                if candidate < *worst {
                    *worst = candidate;
                }
            }
        }

        if top.len() < min_neighbors {
            return Selection::Insufficient { eligible };
        }

        Selection::Selected(Neighborhood {
            item_id,
            neighbors: top.into_sorted_vec().into_iter().map(|r| r.0).collect(),
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
