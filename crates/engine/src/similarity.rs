//! Mean-centered cosine similarity between a query profile and a stored user.
//!
//! Both profiles are centered on their own average rating, then compared over
//! the items they have in common. A pair without common items has no
//! similarity at all (`None`), which is different from a similarity of zero.
//! When centering leaves the query without variance on the overlap (for
//! instance a single-item profile), the raw ratings are compared instead. A
//! stored user without variance on the overlap scores 0.0.

use userknn_core::{UserId, UserProfile};
use userknn_store::RatingStore;

const MIN_NORM_SQUARED: f64 = 1e-12;

pub struct SimilarityEngine<'a> {
    store: &'a RatingStore,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a RatingStore) -> Self {
        Self { store }
    }

    /// Similarity of `query` to the stored user `other`, or `None` when it is
    /// undefined (no overlap, unknown user, empty query).
    pub fn similarity(&self, query: &UserProfile, other: UserId) -> Option<f64> {
        let query_mean = query.mean()?;
        self.similarity_with_mean(query, query_mean, other)
    }

    /// Same as [`similarity`](Self::similarity) with the query mean computed
    /// once by the caller.
    pub fn similarity_with_mean(
        &self,
        query: &UserProfile,
        query_mean: f64,
        other: UserId,
    ) -> Option<f64> {
        let other_profile = self.store.ratings_for(other).ok()?;
        let other_mean = self.store.user_mean(other)?;
        centered_cosine(query, query_mean, other_profile, other_mean)
    }
}

#[derive(Debug, Default)]
struct CosineTerms {
    dot: f64,
    norm_a: f64,
    norm_b: f64,
}

impl CosineTerms {
    fn add(&mut self, a: f64, b: f64) {
        self.dot += a * b;
        self.norm_a += a * a;
        self.norm_b += b * b;
    }

    fn cosine(&self) -> Option<f64> {
        if self.norm_a < MIN_NORM_SQUARED || self.norm_b < MIN_NORM_SQUARED {
            return None;
        }
        let similarity = self.dot / (self.norm_a.sqrt() * self.norm_b.sqrt());
        Some(similarity.clamp(-1.0, 1.0))
    }
}

/// Cosine of the mean-centered overlap of `query` and `other`.
///
/// A query that is flat on the overlap falls back to raw cosine. A flat
/// `other` carries no taste signal and scores 0.0, which keeps it out of any
/// neighborhood.
pub fn centered_cosine(
    query: &UserProfile,
    query_mean: f64,
    other: &UserProfile,
    other_mean: f64,
) -> Option<f64> {
    let mut centered = CosineTerms::default();
    let mut raw = CosineTerms::default();
    let mut overlap = 0usize;

    for_each_shared(query, other, |vq, vo| {
        centered.add(vq - query_mean, vo - other_mean);
        raw.add(vq, vo);
        overlap += 1;
    });

    if overlap == 0 {
        return None;
    }
    if centered.norm_a < MIN_NORM_SQUARED {
        return raw.cosine();
    }
    if centered.norm_b < MIN_NORM_SQUARED {
        return Some(0.0);
    }
    centered.cosine()
}

/// Call `f(a_value, b_value)` for every item rated in both profiles, walking
/// the smaller profile and probing the larger one.
fn for_each_shared(a: &UserProfile, b: &UserProfile, mut f: impl FnMut(f64, f64)) {
    if a.len() <= b.len() {
        for (item, va) in a.iter() {
            if let Some(vb) = b.get(item) {
                f(va, vb);
            }
        }
    } else {
        for (item, vb) in b.iter() {
            if let Some(va) = a.get(item) {
                f(va, vb);
            }
        }
    }
}
