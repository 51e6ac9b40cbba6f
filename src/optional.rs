//! Optionally-set field wrapper
//!
//! Snapshots written by older schema versions simply lack some fields.
//! `OptionallySet<T>` keeps "the field did not exist" apart from "the field
//! exists and holds a zero/null value", so the comparator can tell a column
//! backfill from a real change.
//!
//! On the wire an unset field is omitted. Pair every field with
//! `#[serde(default, skip_serializing_if = "OptionallySet::is_unset")]`;
//! a JSON `null` for an `OptionallySet<Option<T>>` then deserializes as
//! set-to-`None`, while a missing key stays unset.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A value that may be absent from the source schema version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionallySet<T>(Option<T>);

impl<T> OptionallySet<T> {
    /// The field does not exist in the source.
    pub const fn unset() -> Self {
        Self(None)
    }

    /// The field exists and holds `value`.
    pub const fn set(value: T) -> Self {
        Self(Some(value))
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the value, `None` when unset.
    pub fn value(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.0
    }
}

impl<T: Clone + Default> OptionallySet<T> {
    /// The value, or the zero value of `T` when unset.
    pub fn value_or_default(&self) -> T {
        self.0.clone().unwrap_or_default()
    }
}

impl<T> Default for OptionallySet<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T> From<T> for OptionallySet<T> {
    fn from(value: T) -> Self {
        Self::set(value)
    }
}

impl<T: Serialize> Serialize for OptionallySet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OptionallySet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
        version: OptionallySet<Option<String>>,
        #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
        name: OptionallySet<String>,
    }

    #[test]
    fn test_missing_key_is_unset() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert!(probe.version.is_unset());
        assert!(probe.name.is_unset());
    }

    #[test]
    fn test_null_is_set_to_none() {
        let probe: Probe = serde_json::from_str(r#"{"version": null, "name": ""}"#).unwrap();
        assert_eq!(probe.version, OptionallySet::set(None));
        assert_eq!(probe.name, OptionallySet::set(String::new()));
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let probe = Probe {
            version: OptionallySet::unset(),
            name: OptionallySet::set("Grid".to_string()),
        };
        assert_eq!(serde_json::to_string(&probe).unwrap(), r#"{"name":"Grid"}"#);
    }

    #[test]
    fn test_unset_differs_from_zero_value() {
        assert_ne!(OptionallySet::<String>::unset(), OptionallySet::set(String::new()));
        assert_eq!(OptionallySet::<String>::unset().value_or_default(), "");
    }
}
