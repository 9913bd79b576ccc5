//! Error types surfaced by the routing core.
//!
//! The taxonomy is deliberately small: caller contract violations around
//! partition keys and query ranges are hard errors, while an inconsistent
//! topology snapshot is reported as an absent value ("fetch fresh topology
//! and try again") rather than an error. Transient endpoint unavailability
//! is cache state, not an error, and never surfaces through these types.

use std::sync::Arc;

use thiserror::Error;

/// Error that occurred while validating or encoding a logical partition key.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PartitionKeyError {
    /// The key carries fewer components than the container's partition key
    /// definition declares paths.
    #[error("partition key has fewer components than the container's partition key definition")]
    TooFewComponents,

    /// The key carries more components than the container's partition key
    /// definition declares paths. Only reported in strict mode.
    #[error("partition key has more components than the container's partition key definition")]
    TooManyComponents,

    /// The JSON form of a partition key could not be parsed or produced.
    #[error("invalid partition key JSON: {0}")]
    InvalidJson(Arc<serde_json::Error>),

    /// A sentinel component (min/max sentinels, the infinity marker) was fed
    /// into a hashed partition scheme. Sentinels only exist as range bounds.
    #[error("{kind} component cannot be part of a hashed partition key")]
    NonHashableComponent {
        /// Kind name of the offending component.
        kind: &'static str,
    },
}

/// Error that occurred while building or querying a collection routing map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoutingMapError {
    /// Two partition key ranges claim overlapping parts of the key space.
    /// This is a topology bug upstream, not a transient condition.
    #[error("Ranges overlap")]
    RangesOverlap,

    /// The caller passed a multi-range query that is not sorted by min
    /// endpoint, or whose ranges overlap each other.
    #[error("query ranges must be sorted by min endpoint and non-overlapping")]
    MalformedQueryRanges,
}
