//! Client-side partition and endpoint routing core of the Meridian
//! multi-region document database driver.
//!
//! Every document operation has to answer two questions before a single
//! byte goes on the wire: *which physical partition owns this key* and
//! *which regional endpoint should serve this operation right now*. This
//! crate answers both, purely in memory:
//!
//! - [`partition_key`] models logical partition keys as ordered tuples of
//!   typed components and derives their *effective partition key* — the
//!   fixed-format sortable string that range ownership is decided on
//!   (hash-based via murmur3, or order-preserving for range-partitioned
//!   containers).
//! - [`routing`] resolves effective keys and key ranges to the owning
//!   [`routing::PartitionKeyRange`] through an immutable
//!   [`routing::CollectionRoutingMap`] snapshot that tiles the whole key
//!   space, and folds in partition splits without mutating shared state.
//! - [`locations`] tracks preferred and available regional endpoints per
//!   operation kind, deprioritizes recently failed endpoints for a TTL
//!   window, and picks the concrete [`url::Url`] for each request via
//!   [`locations::LocationCache`].
//!
//! The crate performs no I/O and spawns nothing: topology facts are pushed
//! in by the discovery layer of the driver, and every call here is a
//! bounded synchronous computation safe to invoke from any number of
//! in-flight requests concurrently.
//!
//! ```rust
//! use meridian_routing::partition_key::{
//!     PartitionKeyComponent, PartitionKeyDefinition, PartitionKeyInternal, PartitionScheme,
//! };
//! use meridian_routing::routing::{CollectionRoutingMap, PartitionKeyRange};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = PartitionKeyDefinition::new(["/tenantId"], PartitionScheme::HashV2);
//! let key = PartitionKeyInternal::from_components([PartitionKeyComponent::String(
//!     "contoso".to_owned(),
//! )]);
//! let effective = key.effective_partition_key_string(&definition, true)?;
//!
//! let map = CollectionRoutingMap::try_create(
//!     [
//!         (PartitionKeyRange::new("0", "", "7F"), "server-a"),
//!         (PartitionKeyRange::new("1", "7F", "FF"), "server-b"),
//!     ],
//!     "tenants",
//! )?
//! .expect("ranges tile the key space");
//! let owner = map.range_by_effective_partition_key(&effective);
//! assert!(owner.is_some());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod locations;
pub mod partition_key;
pub mod routing;

#[cfg(test)]
pub(crate) mod test_utils;

pub use errors::{PartitionKeyError, RoutingMapError};
pub use locations::{LocationCache, RoutingRequest};
pub use partition_key::{PartitionKeyDefinition, PartitionKeyInternal};
pub use routing::{CollectionRoutingMap, PartitionKeyRange, Range};
