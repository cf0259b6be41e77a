use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{RecError, RecResult};

pub type UserId = i64;
pub type ItemId = i64;

/// A single historical rating. Never mutated after it has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, value: f64) -> Self {
        Self {
            user_id,
            item_id,
            value,
        }
    }
}

/// Inclusive bounds for accepted rating values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    pub min: f64,
    pub max: f64,
}

impl RatingRange {
    pub fn new(min: f64, max: f64) -> RecResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(RecError::invalid(format!(
                "rating range [{}, {}] is not a valid interval",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Reject a supplied rating that falls outside the range.
    pub fn check(&self, item_id: ItemId, value: f64) -> RecResult<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(RecError::invalid(format!(
                "rating {} for item {} is outside [{}, {}]",
                value, item_id, self.min, self.max
            )))
        }
    }
}

impl Default for RatingRange {
    fn default() -> Self {
        Self { min: 0.5, max: 5.0 }
    }
}

/// The ratings of one user keyed by item. Either looked up from the rating
/// store or supplied at request time for a user the store has never seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile {
    ratings: BTreeMap<ItemId, f64>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile, rejecting any value outside `range`.
    pub fn validated<I>(ratings: I, range: &RatingRange) -> RecResult<Self>
    where
        I: IntoIterator<Item = (ItemId, f64)>,
    {
        let profile: Self = ratings.into_iter().collect();
        profile.validate(range)?;
        Ok(profile)
    }

    pub fn validate(&self, range: &RatingRange) -> RecResult<()> {
        for (item_id, value) in self.iter() {
            range.check(item_id, value)?;
        }
        Ok(())
    }

    /// Insert or replace the rating for `item_id`, returning the previous value.
    pub fn insert(&mut self, item_id: ItemId, value: f64) -> Option<f64> {
        self.ratings.insert(item_id, value)
    }

    pub fn get(&self, item_id: ItemId) -> Option<f64> {
        self.ratings.get(&item_id).copied()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.ratings.contains_key(&item_id)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Ratings in ascending item order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
        self.ratings.iter().map(|(item, value)| (*item, *value))
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ratings.keys().copied()
    }

    /// Average rating, `None` for an empty profile.
    pub fn mean(&self) -> Option<f64> {
        if self.ratings.is_empty() {
            return None;
        }
        Some(self.ratings.values().sum::<f64>() / self.ratings.len() as f64)
    }
}

impl FromIterator<(ItemId, f64)> for UserProfile {
    fn from_iter<T: IntoIterator<Item = (ItemId, f64)>>(iter: T) -> Self {
        Self {
            ratings: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<ItemId, f64>> for UserProfile {
    fn from(ratings: BTreeMap<ItemId, f64>) -> Self {
        Self { ratings }
    }
}

/// Who a recommendation is for: a user already in the rating store, or an
/// ad hoc profile such as a merged group profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIdentity {
    ExistingUser(UserId),
    SyntheticProfile(UserProfile),
}

impl From<UserId> for QueryIdentity {
    fn from(user_id: UserId) -> Self {
        Self::ExistingUser(user_id)
    }
}

impl From<UserProfile> for QueryIdentity {
    fn from(profile: UserProfile) -> Self {
        Self::SyntheticProfile(profile)
    }
}

/// Predicted rating for an item the query user has not rated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub item_id: ItemId,
    pub predicted_value: f64,
    /// Number of neighbors that contributed to the prediction.
    pub support_count: usize,
}

impl Prediction {
    /// Descending by predicted value, ascending item id on ties.
    pub fn ranking_order(a: &Prediction, b: &Prediction) -> Ordering {
        b.predicted_value
            .total_cmp(&a.predicted_value)
            .then_with(|| a.item_id.cmp(&b.item_id))
    }
}

/// Top-K predictions, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList {
    items: Vec<Prediction>,
}

impl RankedList {
    /// Wrap predictions that are already in ranking order.
    pub fn from_ranked(items: Vec<Prediction>) -> Self {
        debug_assert!(items
            .windows(2)
            .all(|w| Prediction::ranking_order(&w[0], &w[1]) != Ordering::Greater));
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Prediction] {
        &self.items
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|p| p.item_id).collect()
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Prediction> {
        self.items.iter().find(|p| p.item_id == item_id)
    }

    pub fn into_inner(self) -> Vec<Prediction> {
        self.items
    }
}

impl<'a> IntoIterator for &'a RankedList {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_mean() {
        let profile: UserProfile = vec![(1, 4.0), (2, 2.0), (3, 3.0)].into_iter().collect();
        assert_eq!(profile.len(), 3);
        assert!((profile.mean().unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(UserProfile::new().mean(), None);
    }

    #[test]
    fn test_profile_iterates_in_item_order() {
        let profile: UserProfile = vec![(30, 1.0), (10, 2.0), (20, 3.0)].into_iter().collect();
        let items: Vec<ItemId> = profile.item_ids().collect();
        assert_eq!(items, vec![10, 20, 30]);
    }

    #[test]
    fn test_validated_rejects_out_of_range() {
        let range = RatingRange::default();
        let ok = UserProfile::validated(vec![(1, 0.5), (2, 5.0)], &range);
        assert!(ok.is_ok());

        let err = UserProfile::validated(vec![(1, 4.0), (2, 5.5)], &range).unwrap_err();
        assert!(matches!(err, RecError::InvalidArgument(_)));

        let nan = UserProfile::validated(vec![(1, f64::NAN)], &range).unwrap_err();
        assert!(matches!(nan, RecError::InvalidArgument(_)));
    }

    #[test]
    fn test_rating_range_new() {
        assert!(RatingRange::new(1.0, 10.0).is_ok());
        assert!(RatingRange::new(5.0, 1.0).is_err());
        assert!(RatingRange::new(f64::NEG_INFINITY, 1.0).is_err());
    }

    #[test]
    fn test_ranking_order_ties_by_item() {
        let a = Prediction {
            item_id: 7,
            predicted_value: 4.0,
            support_count: 3,
        };
        let b = Prediction {
            item_id: 3,
            predicted_value: 4.0,
            support_count: 5,
        };
        let c = Prediction {
            item_id: 1,
            predicted_value: 3.0,
            support_count: 5,
        };
        let mut v = vec![c, a, b];
        v.sort_by(Prediction::ranking_order);
        let ids: Vec<ItemId> = v.iter().map(|p| p.item_id).collect();
        assert_eq!(ids, vec![3, 7, 1]);
    }

    #[test]
    fn test_query_identity_serialization() {
        let profile: UserProfile = vec![(1197, 4.5)].into_iter().collect();
        let query = QueryIdentity::SyntheticProfile(profile.clone());
        let json = serde_json::to_string(&query).unwrap();
        assert!(json.contains("synthetic_profile"));
        let back: QueryIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, QueryIdentity::SyntheticProfile(profile));

        let existing: QueryIdentity = 42.into();
        assert_eq!(existing, QueryIdentity::ExistingUser(42));
    }
}
