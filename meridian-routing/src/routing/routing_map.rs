//! The collection routing map: an immutable snapshot assigning every point
//! of the effective partition key space to exactly one partition key range
//! and its owning server.
//!
//! Topology changes never mutate a map. A partition split produces fresh
//! child ranges, which are folded in with [`CollectionRoutingMap::try_combine`]
//! to yield a brand-new snapshot; the caller publishes it with an atomic
//! pointer swap and drops the old one. Concurrent readers therefore share
//! snapshots freely without locking.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::partition_key::{
    MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY, MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY,
};
use crate::routing::range::Range;
use crate::routing::RoutingMapError;

/// A contiguous half-open interval `[min_inclusive, max_exclusive)` of the
/// effective partition key space, owned by one physical partition at a given
/// time. Handed to the routing map by the topology-discovery collaborator as
/// an opaque fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKeyRange {
    /// Identifier of the range, unique within a collection generation.
    pub id: String,
    /// Inclusive lower bound, an effective partition key string.
    pub min_inclusive: String,
    /// Exclusive upper bound, an effective partition key string.
    pub max_exclusive: String,
    /// Ids of the range(s) this range was split from. Used to detect
    /// superseded ancestors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl PartitionKeyRange {
    /// Builds a root range with no parents.
    pub fn new(
        id: impl Into<String>,
        min_inclusive: impl Into<String>,
        max_exclusive: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            min_inclusive: min_inclusive.into(),
            max_exclusive: max_exclusive.into(),
            parents: Vec::new(),
        }
    }

    /// Builds a child range recording the ancestors it supersedes.
    pub fn with_parents(
        id: impl Into<String>,
        min_inclusive: impl Into<String>,
        max_exclusive: impl Into<String>,
        parents: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            parents: parents.into_iter().map(Into::into).collect(),
            ..Self::new(id, min_inclusive, max_exclusive)
        }
    }

    /// The `[min, max)` interval view of this range.
    pub fn to_range(&self) -> Range<String> {
        Range::new(
            self.min_inclusive.clone(),
            self.max_exclusive.clone(),
            true,
            false,
        )
    }

    /// Whether the effective key lies within this range.
    pub fn contains(&self, effective_partition_key: &str) -> bool {
        self.min_inclusive.as_str() <= effective_partition_key
            && effective_partition_key < self.max_exclusive.as_str()
    }
}

/// Immutable snapshot of a collection's partition topology, mapping the full
/// effective key space onto partition key ranges and their server
/// identities.
///
/// Generic over the server identity type `S`, which the map stores but never
/// inspects.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRoutingMap<S> {
    ranges_by_id: HashMap<String, (PartitionKeyRange, S)>,
    /// Sorted by min endpoint; tiles the whole key space with no gaps or
    /// overlaps.
    ordered_ranges: Vec<PartitionKeyRange>,
    /// Every range id named as a parent by any known range.
    gone_ranges: HashSet<String>,
    collection_unique_id: String,
}

impl<S> CollectionRoutingMap<S> {
    /// Tries to assemble a routing map out of `(range, server identity)`
    /// tuples.
    ///
    /// Returns `Ok(None)` when the ranges do not tile the whole key space —
    /// the caller is expected to refetch topology and retry with fresher
    /// data. Overlapping ranges are a hard error: they indicate an upstream
    /// topology bug that fresher data will not fix.
    pub fn try_create(
        ranges: impl IntoIterator<Item = (PartitionKeyRange, S)>,
        collection_unique_id: impl Into<String>,
    ) -> Result<Option<Self>, RoutingMapError> {
        let mut ranges_by_id = HashMap::new();
        let mut gone_ranges = HashSet::new();
        for (range, identity) in ranges {
            gone_ranges.extend(range.parents.iter().cloned());
            ranges_by_id.insert(range.id.clone(), (range, identity));
        }
        Self::try_assemble(ranges_by_id, gone_ranges, collection_unique_id.into())
    }

    /// Folds freshly-discovered ranges (e.g. the children of a split) into
    /// this map, producing a new snapshot.
    ///
    /// Ancestors named in the new ranges' `parents` lists are dropped from
    /// both sides. Returns `Ok(None)` when the merge does not yield a
    /// complete partition of the key space, in which case the caller must
    /// fall back to a full topology reload.
    pub fn try_combine(
        &self,
        new_ranges: impl IntoIterator<Item = (PartitionKeyRange, S)>,
    ) -> Result<Option<Self>, RoutingMapError>
    where
        S: Clone,
    {
        let new_ranges: Vec<(PartitionKeyRange, S)> = new_ranges.into_iter().collect();

        let mut gone_ranges = self.gone_ranges.clone();
        gone_ranges.extend(
            new_ranges
                .iter()
                .flat_map(|(range, _)| range.parents.iter().cloned()),
        );

        let mut ranges_by_id: HashMap<String, (PartitionKeyRange, S)> = self
            .ranges_by_id
            .iter()
            .filter(|(id, _)| !gone_ranges.contains(*id))
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        for (range, identity) in new_ranges {
            if !gone_ranges.contains(&range.id) {
                ranges_by_id.insert(range.id.clone(), (range, identity));
            }
        }

        Self::try_assemble(ranges_by_id, gone_ranges, self.collection_unique_id.clone())
    }

    fn try_assemble(
        ranges_by_id: HashMap<String, (PartitionKeyRange, S)>,
        gone_ranges: HashSet<String>,
        collection_unique_id: String,
    ) -> Result<Option<Self>, RoutingMapError> {
        let mut ordered_ranges: Vec<PartitionKeyRange> = ranges_by_id
            .values()
            .map(|(range, _)| range.clone())
            .collect();
        ordered_ranges.sort_by(|left, right| left.min_inclusive.cmp(&right.min_inclusive));

        for (previous, next) in ordered_ranges.iter().tuple_windows() {
            if next.min_inclusive < previous.max_exclusive {
                return Err(RoutingMapError::RangesOverlap);
            }
        }

        if !Self::is_complete(&ordered_ranges) {
            debug!(
                collection = %collection_unique_id,
                ranges = ordered_ranges.len(),
                "partition key ranges do not tile the key space, full topology reload needed"
            );
            return Ok(None);
        }

        Ok(Some(Self {
            ranges_by_id,
            ordered_ranges,
            gone_ranges,
            collection_unique_id,
        }))
    }

    /// A sorted range list is complete when it starts at the global minimum,
    /// ends at the global exclusive maximum, and each range picks up exactly
    /// where the previous one stops.
    fn is_complete(ordered_ranges: &[PartitionKeyRange]) -> bool {
        let (Some(first), Some(last)) = (ordered_ranges.first(), ordered_ranges.last()) else {
            return false;
        };
        first.min_inclusive == MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY
            && last.max_exclusive == MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY
            && ordered_ranges
                .iter()
                .tuple_windows()
                .all(|(previous, next)| previous.max_exclusive == next.min_inclusive)
    }

    /// Identifier of the collection this map describes.
    pub fn collection_unique_id(&self) -> &str {
        &self.collection_unique_id
    }

    /// All ranges, ordered by min endpoint.
    pub fn ordered_ranges(&self) -> &[PartitionKeyRange] {
        &self.ordered_ranges
    }

    /// The range owning the given effective partition key.
    ///
    /// The global minimum maps to the first range. The global exclusive
    /// maximum is not owned by any range and yields `None`.
    pub fn range_by_effective_partition_key(
        &self,
        effective_partition_key: &str,
    ) -> Option<&PartitionKeyRange> {
        if effective_partition_key == MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY {
            return self.ordered_ranges.first();
        }
        if effective_partition_key == MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY {
            return None;
        }

        // Floor search: the last range whose min does not exceed the key.
        let following = self
            .ordered_ranges
            .partition_point(|range| range.min_inclusive.as_str() <= effective_partition_key);
        self.ordered_ranges.get(following.checked_sub(1)?)
    }

    /// The range with the given id, if it is still part of the topology.
    pub fn range_by_id(&self, range_id: &str) -> Option<&PartitionKeyRange> {
        self.ranges_by_id.get(range_id).map(|(range, _)| range)
    }

    /// The server identity bound to the given range id, if the range is
    /// still part of the topology.
    pub fn server_identity_by_id(&self, range_id: &str) -> Option<&S> {
        self.ranges_by_id.get(range_id).map(|(_, identity)| identity)
    }

    /// Whether the id belongs to a range superseded by a split. Callers use
    /// this to turn a "range gone" response from the backing store into a
    /// topology refresh instead of a generic failure.
    pub fn is_gone(&self, range_id: &str) -> bool {
        self.gone_ranges.contains(range_id)
    }

    /// All ranges intersecting at least one of the query ranges, without
    /// duplicates, ordered by min endpoint.
    ///
    /// The query ranges must be sorted by min endpoint and must not overlap
    /// each other; violating that contract is a hard error (silently
    /// mis-routing is worse than failing). The walk advances both lists in a
    /// single pass and skips query ranges already covered by the resolved
    /// ranges, so a range straddling several queries is fetched once.
    pub fn overlapping_ranges(
        &self,
        sorted_query_ranges: &[Range<String>],
    ) -> Result<Vec<PartitionKeyRange>, RoutingMapError> {
        if !is_sorted_and_non_overlapping(sorted_query_ranges) {
            return Err(RoutingMapError::MalformedQueryRanges);
        }

        let mut resolved: Vec<PartitionKeyRange> = Vec::new();
        let mut resolved_ids: HashSet<String> = HashSet::new();

        let mut index = 0;
        while index < sorted_query_ranges.len() {
            let provided = &sorted_query_ranges[index];
            if provided.is_empty() {
                index += 1;
                continue;
            }

            // Clip the query to the part not yet covered by earlier results.
            let query = match resolved.last() {
                Some(last) if last.max_exclusive > provided.min => Range::new(
                    last.max_exclusive.clone(),
                    provided.max.clone(),
                    false,
                    provided.is_max_inclusive,
                ),
                _ => provided.clone(),
            };
            if query.is_empty() {
                index += 1;
                continue;
            }

            let mut found_any = false;
            for range in self.overlapping_ranges_within(&query) {
                found_any = true;
                if resolved_ids.insert(range.id.clone()) {
                    resolved.push(range.clone());
                }
            }
            if !found_any {
                index += 1;
                continue;
            }

            // Skip every query range already covered by the last resolved
            // range.
            if let Some(last) = resolved.last() {
                let last_interval = last.to_range();
                while index < sorted_query_ranges.len()
                    && Range::cmp_by_max(&sorted_query_ranges[index], &last_interval)
                        != std::cmp::Ordering::Greater
                {
                    index += 1;
                }
            }
        }

        Ok(resolved)
    }

    /// Window scan for a single query range: binary-search the sorted range
    /// list by both endpoints, then filter the candidates by real overlap.
    fn overlapping_ranges_within(
        &self,
        query: &Range<String>,
    ) -> impl Iterator<Item = &PartitionKeyRange> {
        debug_assert!(!self.ordered_ranges.is_empty());

        // Lower edge: floor by min endpoint.
        let start = match self
            .ordered_ranges
            .binary_search_by(|range| range.min_inclusive.as_str().cmp(query.min.as_str()))
        {
            Ok(index) => index,
            Err(insertion_point) => insertion_point.saturating_sub(1),
        };
        // Upper edge: ceiling by max endpoint, clamped to the last range.
        let end = match self
            .ordered_ranges
            .binary_search_by(|range| range.max_exclusive.as_str().cmp(query.max.as_str()))
        {
            Ok(index) => index,
            Err(insertion_point) => insertion_point,
        }
        .min(self.ordered_ranges.len().saturating_sub(1));

        let query = query.clone();
        self.ordered_ranges[start..=end]
            .iter()
            .filter(move |range| Range::overlaps(&range.to_range(), &query))
    }
}

/// The caller contract for multi-range queries: sorted by min endpoint and
/// pairwise non-overlapping (touching endpoints are fine unless both are
/// inclusive).
fn is_sorted_and_non_overlapping(ranges: &[Range<String>]) -> bool {
    ranges.iter().tuple_windows().all(|(previous, next)| {
        match previous.max.cmp(&next.min) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => !(previous.is_max_inclusive && next.is_min_inclusive),
            std::cmp::Ordering::Greater => false,
        }
    })
}
