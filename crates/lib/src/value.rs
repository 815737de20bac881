//! Dynamic values and generic maps.
//!
//! User arguments, build arguments and other opaque data are carried as
//! [`DynamicValue`]s (plain JSON values). Two invariants hold for every value
//! that passes through this module:
//!
//! - Numbers are canonical: a literal that is an exact integer is stored as an
//!   `i64`, everything else (fractions, exponents, integers that overflow
//!   `i64`) as an `f64`.
//! - A [`GenericMap`] that would hold zero entries holds *nothing*. Unset and
//!   set-but-empty are only distinguishable while decoding, never afterwards.
//!   Encoding either yields `{}`, so decoding an encoded empty map yields an
//!   absent one.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Number, Value};

/// A JSON-compatible dynamic value.
pub type DynamicValue = Value;

/// Errors produced while decoding dynamic values.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
  /// The input was not valid JSON.
  #[error("failed to decode data: {0}")]
  Json(#[from] serde_json::Error),

  /// The input was valid JSON but not an object.
  #[error("expected an object, found {found}")]
  NotAnObject { found: &'static str },
}

/// Decode JSON text into a canonical [`DynamicValue`].
pub fn decode_value(data: &[u8]) -> Result<DynamicValue, ValueError> {
  let value: Value = serde_json::from_slice(data)?;
  Ok(canonicalize(value))
}

/// Rewrite every number in `value` into its canonical integer-or-float form.
pub fn canonicalize(value: Value) -> Value {
  match value {
    Value::Number(n) => Value::Number(canonical_number(n)),
    Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
    Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect()),
    other => other,
  }
}

fn canonical_number(n: Number) -> Number {
  if n.is_i64() {
    return n;
  }
  if n.is_u64() {
    // only reachable above i64::MAX
    return n.as_f64().and_then(Number::from_f64).unwrap_or(n);
  }
  // `-0` parses as a float; negative zero is stored as the integer 0, which
  // also folds a literal `-0.0`.
  if n.as_f64().is_some_and(|f| f == 0.0 && f.is_sign_negative()) {
    return Number::from(0i64);
  }
  n
}

/// Merge `overlay` onto `base`, descending into objects present on both sides.
///
/// Any non-object value in `overlay` replaces the value in `base` outright.
pub fn merge_deep(base: Value, overlay: Value) -> Value {
  match (base, overlay) {
    (Value::Object(mut base), Value::Object(overlay)) => {
      for (key, value) in overlay {
        let merged = match base.remove(&key) {
          Some(existing) => merge_deep(existing, value),
          None => value,
        };
        base.insert(key, merged);
      }
      Value::Object(base)
    }
    (_, overlay) => overlay,
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// A string-keyed map of dynamic values that is absent when empty.
#[derive(Clone, Default, PartialEq)]
pub struct GenericMap {
  data: Option<BTreeMap<String, DynamicValue>>,
}

impl GenericMap {
  /// Build a map from entries, normalizing an empty map to absent.
  pub fn new(data: BTreeMap<String, DynamicValue>) -> Self {
    if data.is_empty() {
      return Self::default();
    }
    Self {
      data: Some(data.into_iter().map(|(k, v)| (k, canonicalize(v))).collect()),
    }
  }

  /// Decode a JSON object. `null` and `{}` both decode to an absent map.
  pub fn decode(data: &[u8]) -> Result<Self, ValueError> {
    match decode_value(data)? {
      Value::Null => Ok(Self::default()),
      Value::Object(map) => Ok(Self::new(map.into_iter().collect())),
      other => Err(ValueError::NotAnObject {
        found: type_name(&other),
      }),
    }
  }

  /// Convert any serializable value into a map by round-tripping through JSON.
  pub fn mapify<T: Serialize>(value: &T) -> Result<Self, ValueError> {
    let encoded = serde_json::to_vec(value)?;
    Self::decode(&encoded)
  }

  /// The entries, or `None` when the map is absent.
  pub fn data(&self) -> Option<&BTreeMap<String, DynamicValue>> {
    self.data.as_ref()
  }

  pub fn get(&self, key: &str) -> Option<&DynamicValue> {
    self.data.as_ref().and_then(|d| d.get(key))
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_none()
  }

  /// Return a new map holding the entries of `self` overridden by those of
  /// `from`. Neither input is modified.
  pub fn merge(&self, from: Option<&GenericMap>) -> GenericMap {
    let Some(incoming) = from.and_then(|f| f.data.as_ref()) else {
      return self.clone();
    };

    let mut merged = self.data.clone().unwrap_or_default();
    merged.extend(incoming.iter().map(|(k, v)| (k.clone(), v.clone())));
    GenericMap::new(merged)
  }

  /// Render the map as a JSON object value (`{}` when absent).
  pub fn to_value(&self) -> DynamicValue {
    Value::Object(self.data.clone().unwrap_or_default().into_iter().collect())
  }
}

impl fmt::Debug for GenericMap {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.data {
      Some(data) => f.debug_map().entries(data.iter()).finish(),
      None => f.write_str("GenericMap(absent)"),
    }
  }
}

impl From<BTreeMap<String, DynamicValue>> for GenericMap {
  fn from(data: BTreeMap<String, DynamicValue>) -> Self {
    Self::new(data)
  }
}

impl Serialize for GenericMap {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let entries = self.data.as_ref();
    let mut map = serializer.serialize_map(Some(entries.map_or(0, |d| d.len())))?;
    for (k, v) in entries.into_iter().flatten() {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for GenericMap {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let data = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(data.map(GenericMap::new).unwrap_or_default())
  }
}
