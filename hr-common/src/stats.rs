//! Review aggregate math
//!
//! Personalities carry a denormalized `total_reviews` and `average_review`.
//! The server updates them inside the mutation transaction and the client
//! applies the same formulas to its cache after a local mutation, so both
//! sides round identically.

use serde::{Deserialize, Serialize};

/// Round to two decimal places (half away from zero)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Denormalized review aggregate for one personality
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub total_reviews: i64,
    pub average_review: f64,
}

impl Aggregate {
    pub fn new(total_reviews: i64, average_review: f64) -> Self {
        Self {
            total_reviews,
            average_review,
        }
    }

    /// Aggregate after one more review with `rating`
    ///
    /// `round2((avg * total + rating) / (total + 1))`
    pub fn with_added(self, rating: i64) -> Self {
        let total = self.total_reviews.max(0);
        let sum = self.average_review * total as f64 + rating as f64;
        Self {
            total_reviews: total + 1,
            average_review: round2(sum / (total + 1) as f64),
        }
    }

    /// Aggregate after removing a review with `rating`
    ///
    /// `round2((avg * total - rating) / (total - 1))`, or zero once no
    /// reviews remain.
    pub fn with_removed(self, rating: i64) -> Self {
        if self.total_reviews <= 1 {
            return Self::default();
        }
        let total = self.total_reviews;
        let sum = self.average_review * total as f64 - rating as f64;
        let average = round2(sum / (total - 1) as f64);
        Self {
            total_reviews: total - 1,
            average_review: average.max(0.0),
        }
    }

    /// Aggregate after one review's rating changes from `old` to `new`
    pub fn with_changed(self, old: i64, new: i64) -> Self {
        if old == new || self.total_reviews <= 0 {
            return self;
        }
        let total = self.total_reviews;
        let sum = self.average_review * total as f64 + (new - old) as f64;
        Self {
            total_reviews: total,
            average_review: round2(sum / total as f64),
        }
    }

    /// Exact aggregate of a full set of ratings
    pub fn from_ratings(ratings: &[i64]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }
        let sum: i64 = ratings.iter().sum();
        Self {
            total_reviews: ratings.len() as i64,
            average_review: round2(sum as f64 / ratings.len() as f64),
        }
    }
}
