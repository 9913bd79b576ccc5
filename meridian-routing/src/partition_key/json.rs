//! JSON wire format of logical partition keys.
//!
//! A key serializes as an array of component values in declared key-path
//! order. Special forms:
//! - the exclusive maximum of the key space is the bare string `"Infinity"`,
//! - the undefined component is an empty object `{}`,
//! - the min/max sentinels are `{"type": "MinNumber"}` and friends.
//!
//! A bare `{}` at the top level is accepted as the single-component
//! undefined key, and `[]` parses back to the empty (minimum) key.

use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::partition_key::{PartitionKeyComponent, PartitionKeyInternal};

impl Serialize for PartitionKeyInternal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_exclusive_maximum() {
            return serializer.serialize_str("Infinity");
        }
        let mut seq = serializer.serialize_seq(Some(self.components().len()))?;
        for component in self.components() {
            seq.serialize_element(&ComponentWire(component))?;
        }
        seq.end()
    }
}

struct ComponentWire<'a>(&'a PartitionKeyComponent);

impl Serialize for ComponentWire<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            PartitionKeyComponent::Undefined => serializer.serialize_map(Some(0))?.end(),
            PartitionKeyComponent::Null => serializer.serialize_unit(),
            PartitionKeyComponent::False => serializer.serialize_bool(false),
            PartitionKeyComponent::True => serializer.serialize_bool(true),
            PartitionKeyComponent::Number(value) => serializer.serialize_f64(*value),
            PartitionKeyComponent::String(value) => serializer.serialize_str(value),
            sentinel => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", sentinel.kind_name())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for PartitionKeyInternal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = PartitionKeyInternal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a partition key array, \"Infinity\" or {}")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        if value == "Infinity" {
            Ok(PartitionKeyInternal::exclusive_maximum())
        } else {
            Err(E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut components = Vec::new();
        while let Some(ComponentDe(component)) = seq.next_element()? {
            components.push(component);
        }
        Ok(PartitionKeyInternal::from_components(components))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let component = component_from_map(map)?;
        Ok(PartitionKeyInternal::from_components([component]))
    }
}

struct ComponentDe(PartitionKeyComponent);

impl<'de> Deserialize<'de> for ComponentDe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ComponentVisitor).map(ComponentDe)
    }
}

struct ComponentVisitor;

impl<'de> Visitor<'de> for ComponentVisitor {
    type Value = PartitionKeyComponent;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a partition key component value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(PartitionKeyComponent::Null)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
        Ok(if value {
            PartitionKeyComponent::True
        } else {
            PartitionKeyComponent::False
        })
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(PartitionKeyComponent::Number(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(PartitionKeyComponent::Number(value as f64))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        Ok(PartitionKeyComponent::Number(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(PartitionKeyComponent::String(value.to_owned()))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        component_from_map(map)
    }
}

/// An empty object is the undefined component; an object with a `type` key
/// names one of the range-bound sentinels.
fn component_from_map<'de, A: MapAccess<'de>>(
    mut map: A,
) -> Result<PartitionKeyComponent, A::Error> {
    let Some((key, value)) = map.next_entry::<String, String>()? else {
        return Ok(PartitionKeyComponent::Undefined);
    };
    if key != "type" {
        return Err(de::Error::unknown_field(&key, &["type"]));
    }
    let component = match value.as_str() {
        "MinNumber" => PartitionKeyComponent::MinNumber,
        "MaxNumber" => PartitionKeyComponent::MaxNumber,
        "MinString" => PartitionKeyComponent::MinString,
        "MaxString" => PartitionKeyComponent::MaxString,
        "Infinity" => PartitionKeyComponent::Infinity,
        other => {
            return Err(de::Error::invalid_value(
                de::Unexpected::Str(other),
                &"a sentinel component type",
            ))
        }
    };
    // Reject trailing entries so malformed sentinels fail loudly.
    if map.next_key::<String>()?.is_some() {
        return Err(de::Error::invalid_length(2, &"a single \"type\" entry"));
    }
    Ok(component)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::errors::PartitionKeyError;
    use crate::partition_key::{PartitionKeyComponent, PartitionKeyInternal};
    use crate::test_utils::setup_tracing;

    fn round_trip(key: &PartitionKeyInternal) -> PartitionKeyInternal {
        PartitionKeyInternal::from_json_str(&key.to_json_string().unwrap()).unwrap()
    }

    #[test]
    fn scalar_components_round_trip() {
        setup_tracing();
        let key = PartitionKeyInternal::from_components([
            PartitionKeyComponent::Null,
            PartitionKeyComponent::True,
            PartitionKeyComponent::False,
            PartitionKeyComponent::Number(12.5),
            PartitionKeyComponent::String("tenant-7".to_owned()),
        ]);
        assert_eq!(round_trip(&key), key);
        assert_eq!(
            key.to_json_string().unwrap(),
            r#"[null,true,false,12.5,"tenant-7"]"#
        );
    }

    #[test]
    fn sentinels_round_trip() {
        setup_tracing();
        let key = PartitionKeyInternal::from_components([
            PartitionKeyComponent::MinNumber,
            PartitionKeyComponent::MaxNumber,
            PartitionKeyComponent::MinString,
            PartitionKeyComponent::MaxString,
        ]);
        assert_eq!(round_trip(&key), key);
        assert_eq!(
            key.to_json_string().unwrap(),
            r#"[{"type":"MinNumber"},{"type":"MaxNumber"},{"type":"MinString"},{"type":"MaxString"}]"#
        );
    }

    #[test]
    fn exclusive_maximum_serializes_as_bare_infinity() {
        setup_tracing();
        let key = PartitionKeyInternal::exclusive_maximum();
        assert_eq!(key.to_json_string().unwrap(), r#""Infinity""#);
        assert_eq!(round_trip(&key), key);
    }

    #[test]
    fn empty_and_undefined_forms() {
        setup_tracing();
        assert_eq!(
            PartitionKeyInternal::from_json_str("[]").unwrap(),
            PartitionKeyInternal::empty()
        );

        let undefined =
            PartitionKeyInternal::from_components([PartitionKeyComponent::Undefined]);
        assert_eq!(undefined.to_json_string().unwrap(), "[{}]");
        assert_eq!(round_trip(&undefined), undefined);
        // A bare empty object is the undefined key as well.
        assert_eq!(PartitionKeyInternal::from_json_str("{}").unwrap(), undefined);

        assert_eq!(round_trip(&PartitionKeyInternal::empty()), PartitionKeyInternal::empty());
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        setup_tracing();
        for bad in [
            r#""NotInfinity""#,
            r#"[{"type":"Bogus"}]"#,
            r#"[{"kind":"MinNumber"}]"#,
            r#"[[1,2]]"#,
            "17",
        ] {
            assert_matches!(
                PartitionKeyInternal::from_json_str(bad),
                Err(PartitionKeyError::InvalidJson(_)),
                "{bad} should be rejected"
            );
        }
    }
}
