//! Availability-aware resolution of logical operations to regional
//! endpoints.
//!
//! The cache keeps an immutable `DatabaseAccountLocationsInfo` snapshot
//! that is rebuilt under a single lock and published with an atomic swap, so
//! readers always observe a consistent point-in-time view and never block
//! each other. Transient endpoint failures live outside the snapshot in a
//! fine-grained per-endpoint map with TTL-based expiry: an endpoint marked
//! unavailable is deprioritized, never removed, and returns to its preferred
//! position once the TTL elapses without a fresh failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tracing::{debug, warn};
use url::Url;

use crate::locations::{
    AccountRegion, DatabaseAccount, RequestedOperation, ResourceKind, RoutingRequest,
};

/// How long a marked-unavailable endpoint stays deprioritized without a new
/// failure report.
pub const DEFAULT_UNAVAILABLE_LOCATIONS_TTL: Duration = Duration::from_secs(5 * 60);

/// Outcome of [`LocationCache::should_refresh_endpoints`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshDecision {
    /// Whether a topology refresh is warranted at all.
    pub should_refresh: bool,
    /// False only when the single most-preferred endpoint for some
    /// operation kind is unavailable and no alternate exists — the caller
    /// must then refresh in the foreground, because failing over silently
    /// is impossible.
    pub can_refresh_in_background: bool,
}

/// Immutable snapshot of everything location-shaped the cache knows.
/// Replaced wholesale on every rebuild; never mutated in place.
#[derive(Debug, Clone)]
struct DatabaseAccountLocationsInfo {
    preferred_locations: Vec<String>,
    available_write_locations: Vec<String>,
    available_read_locations: Vec<String>,
    available_write_endpoint_by_location: HashMap<String, Url>,
    available_read_endpoint_by_location: HashMap<String, Url>,
    /// Candidate write endpoints, best first.
    write_endpoints: Vec<Url>,
    /// Candidate read endpoints, best first.
    read_endpoints: Vec<Url>,
    /// Account-confirmed multi-write capability.
    multiple_write_locations_enabled: bool,
    rebuilt_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct UnavailableOperations {
    read: bool,
    write: bool,
}

impl UnavailableOperations {
    fn only(operation: RequestedOperation) -> Self {
        Self {
            read: operation == RequestedOperation::Read,
            write: operation == RequestedOperation::Write,
        }
    }

    fn merge(&mut self, operation: RequestedOperation) {
        match operation {
            RequestedOperation::Read => self.read = true,
            RequestedOperation::Write => self.write = true,
        }
    }

    fn includes(&self, operation: RequestedOperation) -> bool {
        match operation {
            RequestedOperation::Read => self.read,
            RequestedOperation::Write => self.write,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LocationUnavailabilityInfo {
    last_reported_at: Instant,
    unavailable_for: UnavailableOperations,
}

/// Tracks preferred and available regional endpoints for reads and writes
/// and resolves each operation to the endpoint it should target.
///
/// All methods are callable concurrently. Reads only ever load the current
/// snapshot; rebuilds serialize on an internal lock and publish atomically.
#[derive(Debug)]
pub struct LocationCache {
    default_endpoint: Url,
    enable_endpoint_discovery: bool,
    use_multiple_write_locations: bool,
    unavailable_location_ttl: Duration,
    locations: ArcSwap<DatabaseAccountLocationsInfo>,
    rebuild_lock: Mutex<()>,
    endpoint_unavailability: DashMap<Url, LocationUnavailabilityInfo>,
}

impl LocationCache {
    /// Creates a cache with the default unavailability TTL.
    ///
    /// `default_endpoint` is the global (region-agnostic) endpoint used
    /// before discovery has run or when it is disabled;
    /// `preferred_locations` is the client's region preference order.
    pub fn new(
        default_endpoint: Url,
        preferred_locations: Vec<String>,
        enable_endpoint_discovery: bool,
        use_multiple_write_locations: bool,
    ) -> Self {
        Self::with_unavailable_locations_ttl(
            default_endpoint,
            preferred_locations,
            enable_endpoint_discovery,
            use_multiple_write_locations,
            DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        )
    }

    /// As [`LocationCache::new`] with an explicit unavailability TTL.
    pub fn with_unavailable_locations_ttl(
        default_endpoint: Url,
        preferred_locations: Vec<String>,
        enable_endpoint_discovery: bool,
        use_multiple_write_locations: bool,
        unavailable_location_ttl: Duration,
    ) -> Self {
        let initial = DatabaseAccountLocationsInfo {
            preferred_locations,
            available_write_locations: Vec::new(),
            available_read_locations: Vec::new(),
            available_write_endpoint_by_location: HashMap::new(),
            available_read_endpoint_by_location: HashMap::new(),
            write_endpoints: vec![default_endpoint.clone()],
            read_endpoints: vec![default_endpoint.clone()],
            multiple_write_locations_enabled: false,
            rebuilt_at: Instant::now(),
        };
        Self {
            default_endpoint,
            enable_endpoint_discovery,
            use_multiple_write_locations,
            unavailable_location_ttl,
            locations: ArcSwap::from_pointee(initial),
            rebuild_lock: Mutex::new(()),
            endpoint_unavailability: DashMap::new(),
        }
    }

    /// Candidate read endpoints, best first.
    pub fn read_endpoints(&self) -> Vec<Url> {
        self.rebuild_if_unavailability_expired();
        self.locations.load().read_endpoints.clone()
    }

    /// Candidate write endpoints, best first.
    pub fn write_endpoints(&self) -> Vec<Url> {
        self.rebuild_if_unavailability_expired();
        self.locations.load().write_endpoints.clone()
    }

    /// Records a read failure against the endpoint and immediately rebuilds
    /// the ranking so subsequent lookups reflect it.
    pub fn mark_endpoint_unavailable_for_read(&self, endpoint: &Url) {
        self.mark_endpoint_unavailable(endpoint, RequestedOperation::Read);
    }

    /// Records a write failure against the endpoint and immediately rebuilds
    /// the ranking so subsequent lookups reflect it.
    pub fn mark_endpoint_unavailable_for_write(&self, endpoint: &Url) {
        self.mark_endpoint_unavailable(endpoint, RequestedOperation::Write);
    }

    /// Feeds a freshly read account topology into the cache.
    pub fn on_database_account_read(&self, account: &DatabaseAccount) {
        self.update_location_cache(Some(account));
    }

    /// Resolves the endpoint the given request should be sent to.
    ///
    /// A pinned endpoint is returned unchanged, which keeps retry routing
    /// idempotent. Requests outside the multi-write eligible path (metadata
    /// resources, or writes when multi-write is not in effect) alternate
    /// between the account's first two declared write locations — the
    /// manual-failover scheme — while everything else walks the availability
    /// ranked endpoint list for its operation kind.
    pub fn resolve_service_endpoint(&self, request: &RoutingRequest) -> Url {
        if let Some(endpoint) = &request.pinned_endpoint {
            return endpoint.clone();
        }

        let snapshot = self.locations.load();

        let multi_write_eligible = request.resource == ResourceKind::Document
            && (request.operation == RequestedOperation::Read
                || self.can_use_multiple_write_locations(&snapshot));

        if !request.use_preferred_locations || !multi_write_eligible {
            if self.enable_endpoint_discovery && !snapshot.available_write_locations.is_empty() {
                let index = (request.location_index % 2)
                    .min(snapshot.available_write_locations.len() - 1);
                let location = &snapshot.available_write_locations[index];
                if let Some(endpoint) =
                    snapshot.available_write_endpoint_by_location.get(location)
                {
                    return endpoint.clone();
                }
            }
            return self.default_endpoint.clone();
        }

        let endpoints = match request.operation {
            RequestedOperation::Write => &snapshot.write_endpoints,
            RequestedOperation::Read => &snapshot.read_endpoints,
        };
        match endpoints.get(request.location_index % endpoints.len().max(1)) {
            Some(endpoint) => endpoint.clone(),
            None => self.default_endpoint.clone(),
        }
    }

    /// Whether a topology refresh is warranted, and whether it may run in
    /// the background.
    pub fn should_refresh_endpoints(&self) -> RefreshDecision {
        let mut decision = RefreshDecision {
            should_refresh: false,
            can_refresh_in_background: true,
        };
        if !self.enable_endpoint_discovery {
            return decision;
        }

        let snapshot = self.locations.load();
        let most_preferred = snapshot.preferred_locations.first();

        // Multi-write requested but not yet confirmed by the account.
        decision.should_refresh =
            self.use_multiple_write_locations && !snapshot.multiple_write_locations_enabled;

        if let Some(first_read) = snapshot.read_endpoints.first() {
            if self.is_endpoint_unavailable(first_read, RequestedOperation::Read) {
                decision.should_refresh = true;
                decision.can_refresh_in_background = snapshot.read_endpoints.len() > 1;
                return decision;
            }
        }
        if let Some(location) = most_preferred {
            match snapshot.available_read_endpoint_by_location.get(location) {
                Some(endpoint) if snapshot.read_endpoints.first() != Some(endpoint) => {
                    // The preferred region is known but not ranked first.
                    decision.should_refresh = true;
                    return decision;
                }
                Some(_) => {}
                None => {
                    decision.should_refresh = true;
                    return decision;
                }
            }
        }

        if !self.can_use_multiple_write_locations(&snapshot) {
            if let Some(first_write) = snapshot.write_endpoints.first() {
                if self.is_endpoint_unavailable(first_write, RequestedOperation::Write) {
                    decision.should_refresh = true;
                    decision.can_refresh_in_background = snapshot.write_endpoints.len() > 1;
                    return decision;
                }
            }
            decision
        } else if let Some(location) = most_preferred {
            match snapshot.available_write_endpoint_by_location.get(location) {
                Some(endpoint) => {
                    decision.should_refresh |= snapshot.write_endpoints.first() != Some(endpoint);
                    decision
                }
                None => {
                    decision.should_refresh = true;
                    decision
                }
            }
        } else {
            decision
        }
    }

    fn mark_endpoint_unavailable(&self, endpoint: &Url, operation: RequestedOperation) {
        let now = Instant::now();
        self.endpoint_unavailability
            .entry(endpoint.clone())
            .and_modify(|info| {
                info.last_reported_at = now;
                info.unavailable_for.merge(operation);
            })
            .or_insert(LocationUnavailabilityInfo {
                last_reported_at: now,
                unavailable_for: UnavailableOperations::only(operation),
            });
        warn!(%endpoint, ?operation, "endpoint marked unavailable");
        self.update_location_cache(None);
    }

    fn is_endpoint_unavailable(&self, endpoint: &Url, operation: RequestedOperation) -> bool {
        match self.endpoint_unavailability.get(endpoint) {
            Some(info) => {
                info.unavailable_for.includes(operation)
                    && info.last_reported_at.elapsed() < self.unavailable_location_ttl
            }
            None => false,
        }
    }

    /// Unavailability entries expire passively; once any exist and the
    /// snapshot has outlived the TTL, the next endpoint-list read pays for a
    /// rebuild that drops the expired ones and restores the ranking.
    fn rebuild_if_unavailability_expired(&self) {
        if self.endpoint_unavailability.is_empty() {
            return;
        }
        if self.locations.load().rebuilt_at.elapsed() > self.unavailable_location_ttl {
            self.update_location_cache(None);
        }
    }

    fn can_use_multiple_write_locations(&self, snapshot: &DatabaseAccountLocationsInfo) -> bool {
        self.use_multiple_write_locations && snapshot.multiple_write_locations_enabled
    }

    /// The single rebuild region: recomputes the whole snapshot from the
    /// current account topology (or the previous snapshot's copy of it) plus
    /// the unavailability map, then publishes it atomically.
    fn update_location_cache(&self, account: Option<&DatabaseAccount>) {
        let _guard = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let current = self.locations.load_full();

        self.endpoint_unavailability.retain(|_, info| {
            now.duration_since(info.last_reported_at) <= self.unavailable_location_ttl
        });

        let mut multiple_write_locations_enabled = current.multiple_write_locations_enabled;
        let mut available_write_locations = current.available_write_locations.clone();
        let mut available_read_locations = current.available_read_locations.clone();
        let mut available_write_endpoint_by_location =
            current.available_write_endpoint_by_location.clone();
        let mut available_read_endpoint_by_location =
            current.available_read_endpoint_by_location.clone();

        if let Some(account) = account {
            multiple_write_locations_enabled = account.enable_multiple_write_locations;
            (available_write_locations, available_write_endpoint_by_location) =
                endpoints_by_location(&account.writable_regions);
            (available_read_locations, available_read_endpoint_by_location) =
                endpoints_by_location(&account.readable_regions);
        }

        let write_endpoints = self.rank_endpoints(
            &current.preferred_locations,
            &available_write_endpoint_by_location,
            &available_write_locations,
            RequestedOperation::Write,
            multiple_write_locations_enabled,
            &self.default_endpoint,
        );
        // Reads fall back to the best write endpoint rather than straight to
        // the default one.
        let read_fallback = write_endpoints
            .first()
            .cloned()
            .unwrap_or_else(|| self.default_endpoint.clone());
        let read_endpoints = self.rank_endpoints(
            &current.preferred_locations,
            &available_read_endpoint_by_location,
            &available_read_locations,
            RequestedOperation::Read,
            multiple_write_locations_enabled,
            &read_fallback,
        );

        debug!(
            writes = write_endpoints.len(),
            reads = read_endpoints.len(),
            multi_write = multiple_write_locations_enabled,
            "location cache rebuilt"
        );

        self.locations.store(Arc::new(DatabaseAccountLocationsInfo {
            preferred_locations: current.preferred_locations.clone(),
            available_write_locations,
            available_read_locations,
            available_write_endpoint_by_location,
            available_read_endpoint_by_location,
            write_endpoints,
            read_endpoints,
            multiple_write_locations_enabled,
            rebuilt_at: now,
        }));
    }

    /// Ranks candidate endpoints for one operation kind.
    ///
    /// When the operation can spread across regions (reads always, writes
    /// once multi-write is in effect) the client's preference order governs:
    /// available endpoints come first, endpoints inside their unavailability
    /// window are appended at the back so that a full outage still yields a
    /// deterministic last-resort ordering instead of an empty list. When
    /// multi-write is not in effect, writes follow the account-declared
    /// location order directly, because only declared locations carry write
    /// capability in that mode.
    fn rank_endpoints(
        &self,
        preferred_locations: &[String],
        endpoints_by_location: &HashMap<String, Url>,
        ordered_locations: &[String],
        operation: RequestedOperation,
        multiple_write_locations_enabled: bool,
        fallback: &Url,
    ) -> Vec<Url> {
        let mut endpoints = Vec::new();

        let spread_across_regions = operation == RequestedOperation::Read
            || (self.use_multiple_write_locations && multiple_write_locations_enabled);
        if spread_across_regions {
            let mut unavailable = Vec::new();
            for location in preferred_locations {
                if let Some(endpoint) = endpoints_by_location.get(location) {
                    if self.is_endpoint_unavailable(endpoint, operation) {
                        unavailable.push(endpoint.clone());
                    } else {
                        endpoints.push(endpoint.clone());
                    }
                }
            }
            if endpoints.is_empty() {
                endpoints.push(fallback.clone());
            }
            endpoints.extend(unavailable);
        } else {
            for location in ordered_locations {
                if let Some(endpoint) = endpoints_by_location.get(location) {
                    endpoints.push(endpoint.clone());
                }
            }
        }

        if endpoints.is_empty() {
            endpoints.push(fallback.clone());
        }
        endpoints
    }
}

fn endpoints_by_location(regions: &[AccountRegion]) -> (Vec<String>, HashMap<String, Url>) {
    let mut ordered = Vec::with_capacity(regions.len());
    let mut by_location = HashMap::with_capacity(regions.len());
    for region in regions {
        if by_location
            .insert(region.name.clone(), region.endpoint.clone())
            .is_none()
        {
            ordered.push(region.name.clone());
        }
    }
    (ordered, by_location)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::{LocationCache, RefreshDecision};
    use crate::locations::{
        AccountRegion, DatabaseAccount, RequestedOperation, ResourceKind, RoutingRequest,
    };
    use crate::test_utils::setup_tracing;

    fn url(host: &str) -> Url {
        Url::parse(&format!("https://{host}.example.net/")).unwrap()
    }

    fn account(write: &[&str], read: &[&str], multi_write: bool) -> DatabaseAccount {
        DatabaseAccount {
            writable_regions: write
                .iter()
                .map(|name| AccountRegion::new(*name, url(name)))
                .collect(),
            readable_regions: read
                .iter()
                .map(|name| AccountRegion::new(*name, url(name)))
                .collect(),
            enable_multiple_write_locations: multi_write,
        }
    }

    fn cache_with_preferences(
        preferred: &[&str],
        use_multiple_write_locations: bool,
        ttl: Duration,
    ) -> LocationCache {
        LocationCache::with_unavailable_locations_ttl(
            url("global"),
            preferred.iter().map(|s| (*s).to_owned()).collect(),
            true,
            use_multiple_write_locations,
            ttl,
        )
    }

    fn doc_read() -> RoutingRequest {
        RoutingRequest::new(RequestedOperation::Read, ResourceKind::Document)
    }

    fn doc_write() -> RoutingRequest {
        RoutingRequest::new(RequestedOperation::Write, ResourceKind::Document)
    }

    #[test]
    fn preference_order_governs_read_endpoints() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["west", "east"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(
            &["east"],
            &["east", "west", "central"],
            false,
        ));

        // "central" is readable but not preferred, so it does not show up.
        assert_eq!(cache.read_endpoints(), [url("west"), url("east")]);
        // Multi-write off: writes follow the account-declared order.
        assert_eq!(cache.write_endpoints(), [url("east")]);
    }

    #[test]
    fn unknown_preferences_fall_back_to_best_write_endpoint() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["nowhere"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east"], false));

        assert_eq!(cache.read_endpoints(), [url("east")]);
    }

    #[test]
    fn marking_unavailable_demotes_and_ttl_restores() {
        setup_tracing();
        let ttl = Duration::from_millis(60);
        let cache = cache_with_preferences(&["east", "west"], false, ttl);
        cache.on_database_account_read(&account(&["east"], &["east", "west"], false));
        assert_eq!(cache.read_endpoints(), [url("east"), url("west")]);

        cache.mark_endpoint_unavailable_for_read(&url("east"));
        // Still present, but last.
        assert_eq!(cache.read_endpoints(), [url("west"), url("east")]);

        std::thread::sleep(ttl + Duration::from_millis(30));
        // The TTL elapsed with no new failure: preferred order is restored.
        assert_eq!(cache.read_endpoints(), [url("east"), url("west")]);
    }

    #[test]
    fn all_preferred_unavailable_still_yields_deterministic_order() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["east", "west"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east", "west"], false));

        cache.mark_endpoint_unavailable_for_read(&url("east"));
        cache.mark_endpoint_unavailable_for_read(&url("west"));

        // Fallback first, then the unavailable ones in preference order.
        assert_eq!(
            cache.read_endpoints(),
            [url("east"), url("east"), url("west")]
        );
    }

    #[test]
    fn pinned_endpoint_short_circuits_resolution() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["east"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east"], false));

        let mut request = doc_read();
        request.pinned_endpoint = Some(url("pinned"));
        assert_eq!(cache.resolve_service_endpoint(&request), url("pinned"));
    }

    #[test]
    fn writes_alternate_between_first_two_declared_locations() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["west", "east"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(
            &["east", "west", "central"],
            &["east", "west"],
            false,
        ));

        // Multi-write is off, so document writes use manual failover:
        // location_index alternates between the first two declared write
        // locations regardless of client preference.
        let mut request = doc_write();
        assert_eq!(cache.resolve_service_endpoint(&request), url("east"));
        request.location_index = 1;
        assert_eq!(cache.resolve_service_endpoint(&request), url("west"));
        request.location_index = 2;
        assert_eq!(cache.resolve_service_endpoint(&request), url("east"));
        request.location_index = 3;
        assert_eq!(cache.resolve_service_endpoint(&request), url("west"));
    }

    #[test]
    fn metadata_requests_route_to_the_write_region() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["west"],
            true,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east", "west"], &["east", "west"], true));

        let request = RoutingRequest::new(RequestedOperation::Read, ResourceKind::Container);
        assert_eq!(cache.resolve_service_endpoint(&request), url("east"));
    }

    #[test]
    fn multi_write_documents_walk_the_ranked_write_list() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["west", "east"],
            true,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east", "west"], &["east", "west"], true));

        let mut request = doc_write();
        assert_eq!(cache.resolve_service_endpoint(&request), url("west"));
        request.location_index = 1;
        assert_eq!(cache.resolve_service_endpoint(&request), url("east"));

        // Reads walk the ranked read list the same way.
        let mut request = doc_read();
        assert_eq!(cache.resolve_service_endpoint(&request), url("west"));
        request.location_index = 1;
        assert_eq!(cache.resolve_service_endpoint(&request), url("east"));
    }

    #[test]
    fn discovery_disabled_resolves_to_default_endpoint() {
        setup_tracing();
        let cache = LocationCache::new(
            url("global"),
            vec!["east".to_owned()],
            false,
            false,
        );
        cache.on_database_account_read(&account(&["east"], &["east"], false));

        assert_eq!(cache.resolve_service_endpoint(&doc_write()), url("global"));
        assert_eq!(
            cache.should_refresh_endpoints(),
            RefreshDecision {
                should_refresh: false,
                can_refresh_in_background: true
            }
        );
    }

    #[test]
    fn refresh_wanted_until_multi_write_confirmed() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["east"],
            true,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east"], false));

        // Multi-write requested but the account has not confirmed it yet.
        let decision = cache.should_refresh_endpoints();
        assert!(decision.should_refresh);
        assert!(decision.can_refresh_in_background);

        cache.on_database_account_read(&account(&["east"], &["east"], true));
        let decision = cache.should_refresh_endpoints();
        assert!(!decision.should_refresh);
    }

    #[test]
    fn refresh_wanted_when_preferred_region_is_not_ranked_first() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["west", "east"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        // The preferred region is not readable yet as far as the account
        // knows.
        cache.on_database_account_read(&account(&["east"], &["east"], false));
        assert!(cache.should_refresh_endpoints().should_refresh);

        // Once the preferred region shows up and ranks first, no refresh is
        // needed.
        cache.on_database_account_read(&account(&["east"], &["east", "west"], false));
        assert!(!cache.should_refresh_endpoints().should_refresh);
    }

    #[test]
    fn sole_endpoint_unavailable_forces_foreground_refresh() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["east"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east"], false));

        // The only declared write location fails for writes: refresh must
        // happen in the foreground, there is nothing to fail over to.
        cache.mark_endpoint_unavailable_for_write(&url("east"));
        let decision = cache.should_refresh_endpoints();
        assert!(decision.should_refresh);
        assert!(!decision.can_refresh_in_background);
    }

    #[test]
    fn unavailable_preferred_read_endpoint_triggers_refresh() {
        setup_tracing();
        let cache = cache_with_preferences(
            &["east", "west"],
            false,
            super::DEFAULT_UNAVAILABLE_LOCATIONS_TTL,
        );
        cache.on_database_account_read(&account(&["east"], &["east", "west"], false));

        cache.mark_endpoint_unavailable_for_read(&url("west"));
        // The failure hit a non-first endpoint; the ranking still leads with
        // an available one, so nothing to refresh.
        let before = cache.should_refresh_endpoints();
        assert!(!before.should_refresh);

        cache.mark_endpoint_unavailable_for_read(&url("east"));
        let decision = cache.should_refresh_endpoints();
        assert!(decision.should_refresh);
        assert!(decision.can_refresh_in_background);
    }
}
