//! The logical partition key tuple and its effective (sortable) form.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::PartitionKeyError;
use crate::partition_key::PartitionKeyComponent;
use crate::routing::murmur::{murmur3_128, murmur3_32};

/// Effective partition key of the global minimum of the key space.
pub const MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY: &str = "";

/// Effective partition key of the global (exclusive) maximum of the key
/// space. No document key ever maps to it: hash V2 clears the top two bits
/// of its digest and every binary-sort encoding starts with a type tag
/// below 0xFF.
pub const MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY: &str = "FF";

/// Most keys are a single component; two covers the common composite case.
type Components = SmallVec<[PartitionKeyComponent; 2]>;

/// A logical partition key: the ordered component values extracted from a
/// document along the container's declared key paths.
///
/// Immutable once constructed. Ordering is lexicographic over components
/// with shorter tuples sorting first on equal prefixes, which together with
/// the per-component order yields a total order over the whole key space.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionKeyInternal {
    components: Components,
}

impl PartitionKeyInternal {
    /// The key with no components: the inclusive minimum of the key space.
    pub fn empty() -> Self {
        Self {
            components: Components::new(),
        }
    }

    /// The exclusive maximum of the key space.
    pub fn exclusive_maximum() -> Self {
        Self::from_components([PartitionKeyComponent::Infinity])
    }

    /// Builds a key from component values in declared key-path order.
    pub fn from_components(
        components: impl IntoIterator<Item = PartitionKeyComponent>,
    ) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    /// The components of this key, in declared key-path order.
    pub fn components(&self) -> &[PartitionKeyComponent] {
        &self.components
    }

    /// True for the minimum sentinel (no components).
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True for the exclusive maximum sentinel.
    pub fn is_exclusive_maximum(&self) -> bool {
        matches!(self.components.as_slice(), [PartitionKeyComponent::Infinity])
    }

    /// Parses the JSON wire form of a partition key.
    pub fn from_json_str(json: &str) -> Result<Self, PartitionKeyError> {
        serde_json::from_str(json).map_err(|err| PartitionKeyError::InvalidJson(err.into()))
    }

    /// Renders the JSON wire form of this key.
    pub fn to_json_string(&self) -> Result<String, PartitionKeyError> {
        serde_json::to_string(self).map_err(|err| PartitionKeyError::InvalidJson(err.into()))
    }

    /// Derives the effective partition key string: the fixed-format,
    /// hex-encoded value that range ownership is decided on.
    ///
    /// The sentinels map to the global bounds of the key space. For regular
    /// keys the component count is validated against the definition's
    /// declared paths; an oversized key is only rejected when `strict`.
    pub fn effective_partition_key_string(
        &self,
        definition: &PartitionKeyDefinition,
        strict: bool,
    ) -> Result<String, PartitionKeyError> {
        if self.is_empty() {
            return Ok(MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY.to_owned());
        }
        if self.is_exclusive_maximum() {
            return Ok(MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY.to_owned());
        }

        match self.components.len().cmp(&definition.paths.len()) {
            Ordering::Less => return Err(PartitionKeyError::TooFewComponents),
            Ordering::Greater if strict => return Err(PartitionKeyError::TooManyComponents),
            _ => {}
        }

        match definition.scheme {
            PartitionScheme::HashV1 => self.effective_key_hash_v1(),
            PartitionScheme::HashV2 => self.effective_key_hash_v2(),
            PartitionScheme::Range => {
                let mut buf = Vec::new();
                for component in &self.components {
                    component.write_for_binary_sort(&mut buf);
                }
                Ok(hex_upper(&buf))
            }
        }
    }

    /// Legacy hash scheme: 32-bit murmur3 over the truncated hashing form,
    /// with the hash prepended as a number component before binary encoding.
    fn effective_key_hash_v1(&self) -> Result<String, PartitionKeyError> {
        let truncated: Components = self.components.iter().map(|c| c.truncate()).collect();

        let mut payload = Vec::new();
        for component in &truncated {
            component.write_for_hashing_v1(&mut payload)?;
        }
        let hash = murmur3_32(&payload);

        let mut buf = Vec::new();
        PartitionKeyComponent::Number(f64::from(hash)).write_for_binary_sort(&mut buf);
        for component in &truncated {
            component.write_for_binary_sort(&mut buf);
        }
        Ok(hex_upper(&buf))
    }

    /// Hash scheme V2: 128-bit murmur3 over the untruncated hashing form.
    /// The digest is presented most-significant-byte first with the top two
    /// bits cleared, keeping every key strictly below the "FF" sentinel.
    fn effective_key_hash_v2(&self) -> Result<String, PartitionKeyError> {
        let mut payload = Vec::new();
        for component in &self.components {
            component.write_for_hashing_v2(&mut payload)?;
        }
        let (h1, h2) = murmur3_128(&payload);

        let mut digest = [0u8; 16];
        digest[..8].copy_from_slice(&h2.to_be_bytes());
        digest[8..].copy_from_slice(&h1.to_be_bytes());
        digest[0] &= 0x3F;
        Ok(hex_upper(&digest))
    }
}

/// How a container maps logical partition keys onto the effective key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionScheme {
    /// Legacy 32-bit murmur3 hashing with truncated components.
    HashV1,
    /// 128-bit murmur3 hashing, the default for new containers.
    HashV2,
    /// No hashing: keys are range-mapped through their binary sort form.
    Range,
}

/// The container-level partition key descriptor: the declared key paths and
/// the partitioning scheme. Supplied by the topology collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKeyDefinition {
    /// Document paths the key components are extracted from, in order.
    pub paths: Vec<String>,
    /// Partitioning scheme of the container.
    pub scheme: PartitionScheme,
}

impl PartitionKeyDefinition {
    /// Convenience constructor used throughout the driver.
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>, scheme: PartitionScheme) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            scheme,
        }
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Uppercase hex, so effective keys compare correctly against the "FF"
/// sentinel under plain string ordering.
fn hex_upper(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::errors::PartitionKeyError;
    use crate::test_utils::setup_tracing;

    fn single_string_key(value: &str) -> PartitionKeyInternal {
        PartitionKeyInternal::from_components([PartitionKeyComponent::String(value.to_owned())])
    }

    #[test]
    fn tuple_order_is_lexicographic_and_shorter_first() {
        setup_tracing();
        let ab = PartitionKeyInternal::from_components([
            PartitionKeyComponent::String("a".to_owned()),
            PartitionKeyComponent::String("b".to_owned()),
        ]);
        let a = single_string_key("a");
        let b = single_string_key("b");

        assert!(PartitionKeyInternal::empty() < a);
        assert!(a < ab);
        assert!(ab < b);
        assert!(b < PartitionKeyInternal::exclusive_maximum());
    }

    #[test]
    fn sentinels_short_circuit_effective_key_derivation() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/tenantId"], PartitionScheme::HashV2);

        assert_eq!(
            PartitionKeyInternal::empty()
                .effective_partition_key_string(&definition, true)
                .unwrap(),
            MINIMUM_INCLUSIVE_EFFECTIVE_PARTITION_KEY
        );
        assert_eq!(
            PartitionKeyInternal::exclusive_maximum()
                .effective_partition_key_string(&definition, true)
                .unwrap(),
            MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY
        );
    }

    #[test]
    fn component_count_is_validated_against_declared_paths() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(
            ["/tenantId", "/userId"],
            PartitionScheme::HashV2,
        );

        let too_few = single_string_key("contoso");
        assert_matches!(
            too_few.effective_partition_key_string(&definition, true),
            Err(PartitionKeyError::TooFewComponents)
        );

        let too_many = PartitionKeyInternal::from_components([
            PartitionKeyComponent::String("contoso".to_owned()),
            PartitionKeyComponent::String("alice".to_owned()),
            PartitionKeyComponent::Number(7.0),
        ]);
        assert_matches!(
            too_many.effective_partition_key_string(&definition, true),
            Err(PartitionKeyError::TooManyComponents)
        );
        // Oversized keys pass in non-strict mode.
        assert!(too_many
            .effective_partition_key_string(&definition, false)
            .is_ok());
    }

    #[test]
    fn hash_v2_matches_reference_digest_presentation() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/tenantId"], PartitionScheme::HashV2);
        let key = single_string_key("contoso");
        let effective = key
            .effective_partition_key_string(&definition, true)
            .unwrap();

        // Independently assemble the expected value: the V2 hashing form of
        // the single string component is its type tag, the UTF-8 bytes and
        // the 0xFF terminator; the digest is presented big-endian with the
        // top two bits cleared.
        let mut payload = vec![0x08];
        payload.extend_from_slice(b"contoso");
        payload.push(0xFF);
        let (h1, h2) = murmur3_128(&payload);
        let mut digest = [0u8; 16];
        digest[..8].copy_from_slice(&h2.to_be_bytes());
        digest[8..].copy_from_slice(&h1.to_be_bytes());
        digest[0] &= 0x3F;
        let expected: String = digest.iter().map(|b| format!("{b:02X}")).collect();

        assert_eq!(effective, expected);
        assert_eq!(effective.len(), 32);
        assert!(effective.as_str() < MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY);
    }

    #[test]
    fn hash_v2_is_deterministic() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/tenantId"], PartitionScheme::HashV2);
        let first = single_string_key("contoso")
            .effective_partition_key_string(&definition, true)
            .unwrap();
        let second = single_string_key("contoso")
            .effective_partition_key_string(&definition, true)
            .unwrap();
        let other = single_string_key("fabrikam")
            .effective_partition_key_string(&definition, true)
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn hash_v1_truncates_long_strings() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/blob"], PartitionScheme::HashV1);
        let shared_prefix = "p".repeat(crate::partition_key::MAX_STRING_CHARS);

        let a = single_string_key(&format!("{shared_prefix}-first"))
            .effective_partition_key_string(&definition, true)
            .unwrap();
        let b = single_string_key(&format!("{shared_prefix}-second"))
            .effective_partition_key_string(&definition, true)
            .unwrap();
        // Only the first hundred characters take part in the legacy scheme.
        assert_eq!(a, b);

        let c = single_string_key("short")
            .effective_partition_key_string(&definition, true)
            .unwrap();
        assert_ne!(a, c);
        // The hash is prepended as a number component.
        assert!(a.starts_with("05"));
    }

    #[test]
    fn range_scheme_preserves_key_order() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/name"], PartitionScheme::Range);
        let apple = single_string_key("apple")
            .effective_partition_key_string(&definition, true)
            .unwrap();
        let banana = single_string_key("banana")
            .effective_partition_key_string(&definition, true)
            .unwrap();

        assert!(apple < banana);
        assert!(banana.as_str() < MAXIMUM_EXCLUSIVE_EFFECTIVE_PARTITION_KEY);
    }

    #[test]
    fn numbers_round_trip_through_range_encoding_in_order() {
        setup_tracing();
        let definition = PartitionKeyDefinition::new(["/score"], PartitionScheme::Range);
        let values = [-1000.25, -1.0, 0.0, 0.5, 3.0, 1e9];
        let encoded: Vec<String> = values
            .iter()
            .map(|v| {
                PartitionKeyInternal::from_components([PartitionKeyComponent::Number(*v)])
                    .effective_partition_key_string(&definition, true)
                    .unwrap()
            })
            .collect();

        for window in encoded.windows(2) {
            assert!(window[0] < window[1], "{window:?} out of order");
        }
    }
}
