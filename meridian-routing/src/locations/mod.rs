//! Multi-region endpoint topology: the database account descriptor supplied
//! by the discovery collaborator, the per-request routing context, and the
//! location cache that turns both into concrete regional endpoints.

pub mod cache;

pub use cache::{LocationCache, RefreshDecision, DEFAULT_UNAVAILABLE_LOCATIONS_TTL};

use serde::{Deserialize, Serialize};
use url::Url;

/// One regional deployment of the account: a location name (e.g.
/// `"West Europe"`) and the endpoint serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRegion {
    /// Region name, as declared by the service.
    pub name: String,
    /// Endpoint URL of the regional service gateway.
    pub endpoint: Url,
}

impl AccountRegion {
    /// Convenience constructor, mostly for tests and examples.
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
        }
    }
}

/// The account topology descriptor, as read from the service by the
/// discovery collaborator and fed into
/// [`LocationCache::on_database_account_read`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseAccount {
    /// Regions accepting writes, in account-declared failover priority
    /// order.
    #[serde(default)]
    pub writable_regions: Vec<AccountRegion>,
    /// Regions serving reads.
    #[serde(default)]
    pub readable_regions: Vec<AccountRegion>,
    /// Whether the account accepts writes in every writable region rather
    /// than only the first one.
    #[serde(default)]
    pub enable_multiple_write_locations: bool,
}

/// The operation kind a request routes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestedOperation {
    /// A read-only operation.
    Read,
    /// A mutating operation.
    Write,
}

/// The resource class a request addresses. Only document requests are
/// eligible for multi-region write routing; everything else sticks to the
/// account's declared write region order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResourceKind {
    /// A document (item) request.
    Document,
    /// A container (collection) metadata request.
    Container,
    /// An account-level metadata request.
    Account,
}

/// Per-request routing context handed to
/// [`LocationCache::resolve_service_endpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRequest {
    /// Read or write intent.
    pub operation: RequestedOperation,
    /// Resource class being addressed.
    pub resource: ResourceKind,
    /// Retry ordinal used to walk the candidate endpoint list; the first
    /// attempt carries 0.
    pub location_index: usize,
    /// Whether client region preferences apply to this request.
    pub use_preferred_locations: bool,
    /// A specific endpoint this request must go to, if any. Retries pin the
    /// endpoint they first targeted so a topology change mid-flight cannot
    /// silently reroute them.
    pub pinned_endpoint: Option<Url>,
}

impl RoutingRequest {
    /// A first-attempt request with preferences enabled and no pinned
    /// endpoint.
    pub fn new(operation: RequestedOperation, resource: ResourceKind) -> Self {
        Self {
            operation,
            resource,
            location_index: 0,
            use_preferred_locations: true,
            pinned_endpoint: None,
        }
    }
}
