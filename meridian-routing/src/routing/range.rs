//! Generic intervals over an ordered type, with endpoint inclusivity flags.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// An interval over an ordered type. Both endpoints carry their own
/// inclusivity flag, so half-open ranges (the shape partition key ranges
/// take) and closed query ranges share one representation.
///
/// A range with `min == max` that is not closed on both ends is empty;
/// empty ranges are skippable and never overlap anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Range<T> {
    /// Lower endpoint.
    pub min: T,
    /// Upper endpoint.
    pub max: T,
    /// Whether `min` itself belongs to the range.
    pub is_min_inclusive: bool,
    /// Whether `max` itself belongs to the range.
    pub is_max_inclusive: bool,
}

impl<T: Ord> Range<T> {
    /// Builds a range from its endpoints and inclusivity flags.
    pub fn new(min: T, max: T, is_min_inclusive: bool, is_max_inclusive: bool) -> Self {
        Self {
            min,
            max,
            is_min_inclusive,
            is_max_inclusive,
        }
    }

    /// The single-point range containing exactly `value`.
    pub fn point(value: T) -> Self
    where
        T: Clone,
    {
        Self::new(value.clone(), value, true, true)
    }

    /// True when no value can satisfy both endpoint bounds.
    pub fn is_empty(&self) -> bool {
        !(self.is_min_inclusive && self.is_max_inclusive) && self.min == self.max
    }

    /// Whether `value` lies within the range.
    pub fn contains(&self, value: &T) -> bool {
        let above_min = match value.cmp(&self.min) {
            Ordering::Greater => true,
            Ordering::Equal => self.is_min_inclusive,
            Ordering::Less => false,
        };
        let below_max = match value.cmp(&self.max) {
            Ordering::Less => true,
            Ordering::Equal => self.is_max_inclusive,
            Ordering::Greater => false,
        };
        above_min && below_max
    }

    /// Whether the two ranges share at least one value. Touching endpoints
    /// only count when both touching bounds are inclusive.
    pub fn overlaps(left: &Self, right: &Self) -> bool {
        if left.is_empty() || right.is_empty() {
            return false;
        }
        let left_starts_before_right_ends = left.min.cmp(&right.max);
        let right_starts_before_left_ends = right.min.cmp(&left.max);

        if left_starts_before_right_ends != Ordering::Greater
            && right_starts_before_left_ends != Ordering::Greater
        {
            if (left_starts_before_right_ends == Ordering::Equal
                && !(left.is_min_inclusive && right.is_max_inclusive))
                || (right_starts_before_left_ends == Ordering::Equal
                    && !(right.is_min_inclusive && left.is_max_inclusive))
            {
                return false;
            }
            return true;
        }
        false
    }

    /// Orders by lower endpoint; an inclusive bound sorts before an
    /// exclusive one at the same value. Used for the lower edge of binary
    /// search windows.
    pub fn cmp_by_min(left: &Self, right: &Self) -> Ordering {
        left.min.cmp(&right.min).then_with(|| {
            match (left.is_min_inclusive, right.is_min_inclusive) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        })
    }

    /// Orders by upper endpoint; an exclusive bound sorts before an
    /// inclusive one at the same value.
    pub fn cmp_by_max(left: &Self, right: &Self) -> Ordering {
        left.max.cmp(&right.max).then_with(|| {
            match (left.is_max_inclusive, right.is_max_inclusive) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            }
        })
    }
}
