//! Canonical JSON encoding. `serde_json::Map` in this workspace is backed by
//! a `BTreeMap` (the `preserve_order` feature is never enabled), so object
//! keys are already emitted in lexicographic order by `serde_json::to_vec`.
//! Canonicalization therefore reduces to: NFC-normalize every string leaf,
//! then serialize with no insignificant whitespace. Numbers are emitted in
//! serde_json's shortest round-trip form already.

use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::error::IntegrityError;

fn normalize_strings(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.nfc().collect::<String>()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_strings).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.nfc().collect::<String>(), normalize_strings(v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// `canonical(x) -> bytes`. Deterministic for any `Value` built from valid
/// UTF-8 strings and finite numbers.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, IntegrityError> {
    let normalized = normalize_strings(value);
    serde_json::to_vec(&normalized).map_err(IntegrityError::from)
}

/// `canonical(x)` over any serializable type, going through `Value` so
/// string normalization and key ordering apply uniformly.
pub fn canonical_bytes_of<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, IntegrityError> {
    let as_value = serde_json::to_value(value)?;
    canonical_bytes(&as_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn key_order_is_lexicographic_regardless_of_insertion_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_bytes(&a).unwrap(), canonical_bytes(&b).unwrap());
    }

    #[test]
    fn idempotent_round_trip() {
        let v = json!({"z": [1, 2, {"inner": "value"}], "a": "café"});
        let once = canonical_bytes(&v).unwrap();
        let parsed: Value = serde_json::from_slice(&once).unwrap();
        let twice = canonical_bytes(&parsed).unwrap();
        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn canonical_is_idempotent_on_arbitrary_objects(
            a in any::<i64>(), b in ".*", c in any::<bool>()
        ) {
            let v = json!({"a": a, "b": b, "c": c});
            let once = canonical_bytes(&v).unwrap();
            let parsed: Value = serde_json::from_slice(&once).unwrap();
            let twice = canonical_bytes(&parsed).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
