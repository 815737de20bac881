//! Properties of dynamic values and deploy-argument maps.

use acorn_appdef::value::{GenericMap, decode_value};
use serde_json::json;

#[test]
fn merge_with_absent_is_identity() {
  let absent = GenericMap::default();
  let samples = [
    GenericMap::decode(br#"{"a": 1}"#).unwrap(),
    GenericMap::decode(br#"{"nested": {"x": [1, 2.5, "s"]}, "flag": true}"#).unwrap(),
    absent.clone(),
  ];

  for v in &samples {
    assert_eq!(&v.merge(Some(&absent)), v);
    assert_eq!(&v.merge(None), v);
    assert_eq!(&absent.merge(Some(v)), v);
  }
}

#[test]
fn empty_object_is_absent() {
  let empty = GenericMap::decode(b"{}").unwrap();
  assert!(empty.is_empty());
  assert_eq!(empty.data(), None);

  let x = GenericMap::decode(br#"{"k": "v"}"#).unwrap();
  assert_eq!(x.merge(Some(&empty)), x);
}

#[test]
fn numbers_keep_their_kind() {
  let int = decode_value(b"42").unwrap();
  assert_eq!(int.as_i64(), Some(42));
  assert!(int.is_i64() || int.is_u64());

  let float = decode_value(b"3.14").unwrap();
  assert!(float.is_f64());
  assert_eq!(float.to_string(), "3.14");

  for value in [int, float] {
    let encoded = serde_json::to_vec(&value).unwrap();
    assert_eq!(decode_value(&encoded).unwrap(), value);
  }
}

#[test]
fn later_map_wins_on_conflict() {
  let base = GenericMap::decode(br#"{"a": 1, "b": 2}"#).unwrap();
  let from = GenericMap::decode(br#"{"b": 3}"#).unwrap();
  assert_eq!(base.merge(Some(&from)).to_value(), json!({"a": 1, "b": 3}));
}
