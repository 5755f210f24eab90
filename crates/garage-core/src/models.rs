//! Data models for Garage
//!
//! Defines the records kept by the store: the two reference tables
//! (`Family`, `Car`) and the two history logs (`SavedState`, `SavedParking`).
//! Field names on the wire are camelCase so records exported by the
//! application round-trip without renaming.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A car family, keyed by its name
///
/// Only `family_name` and `order` are interpreted by the store; any other
/// fields are kept verbatim in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// Natural key
    pub family_name: String,
    /// Display position. Seeding fills it from the seed position when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Opaque application fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Family {
    /// Create a family with no order and no extra fields
    pub fn new(family_name: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            order: None,
            extra: Map::new(),
        }
    }

    /// Builder-style setter for `order`
    pub fn with_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Builder-style setter for an opaque field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A car, keyed by an opaque identifier
///
/// A numeric `id` in the JSON is accepted and kept as its decimal string,
/// so `{"id": 7}` and `{"id": "7"}` name the same car.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Car {
    /// Natural key
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Opaque application fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Car {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Builder-style setter for an opaque field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A snapshot of application state kept in a bounded history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedState {
    /// Engine-assigned key, `None` until appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Serialized application state, opaque to the store
    pub state: Value,
}

impl SavedState {
    /// Create a snapshot stamped with the current time
    pub fn new(name: impl Into<String>, state: Value) -> Self {
        Self::at(name, Utc::now().timestamp_millis(), state)
    }

    /// Create a snapshot with an explicit timestamp
    pub fn at(name: impl Into<String>, timestamp: i64, state: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            timestamp,
            state,
        }
    }
}

/// A saved parking entry kept in a bounded history
///
/// Several entries may share a `name`; the store never merges them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedParking {
    /// Engine-assigned key, `None` until appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub limit: i64,
    #[serde(default)]
    pub memo: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl SavedParking {
    /// Create an entry stamped with the current time
    pub fn new(name: impl Into<String>, limit: i64, memo: impl Into<String>) -> Self {
        Self::at(name, limit, memo, Utc::now().timestamp_millis())
    }

    /// Create an entry with an explicit timestamp
    pub fn at(name: impl Into<String>, limit: i64, memo: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            limit,
            memo: memo.into(),
            timestamp,
        }
    }
}

/// Initial reference data written when the store is first created
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Seed {
    #[serde(default)]
    pub families: Vec<Family>,
    #[serde(default)]
    pub cars: Vec<Car>,
}

impl Seed {
    pub fn new(families: Vec<Family>, cars: Vec<Car>) -> Self {
        Self { families, cars }
    }

    /// A seed that writes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty() && self.cars.is_empty()
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, found {other}"
        ))),
    }
}
