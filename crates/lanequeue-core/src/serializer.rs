use crate::error::QueueError;
use std::collections::BTreeMap;

/// Converts job payloads to and from the text blob stored in `jobs.data`.
///
/// Called once per `add`/`add_many`; the worker hands the raw text back to
/// the caller's handler, which is responsible for deserializing it with the
/// matching half of this trait.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: serde_json::Value) -> Result<String, QueueError>;
    fn deserialize(&self, text: &str) -> Result<serde_json::Value, QueueError>;
}

/// Default serializer: canonical JSON with object keys sorted recursively.
///
/// "Canonical" here means deterministic key order, not a minimal wire
/// format — two payloads that are structurally equal serialize to
/// byte-identical text regardless of the order fields were inserted in the
/// source `serde_json::Map`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalJsonSerializer;

impl Serializer for CanonicalJsonSerializer {
    fn serialize(&self, value: serde_json::Value) -> Result<String, QueueError> {
        let canonical = canonicalize(value);
        serde_json::to_string(&canonical).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> Result<serde_json::Value, QueueError> {
        serde_json::from_str(text).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_object_keys_recursively() {
        let ser = CanonicalJsonSerializer;
        let value = serde_json::json!({"b": 2, "a": {"d": 4, "c": 3}});
        let text = ser.serialize(value).unwrap();
        assert_eq!(text, r#"{"a":{"c":3,"d":4},"b":2}"#);
    }

    #[test]
    fn empty_object_round_trips() {
        let ser = CanonicalJsonSerializer;
        let text = ser.serialize(serde_json::json!({})).unwrap();
        assert_eq!(text, "{}");
        assert_eq!(ser.deserialize(&text).unwrap(), serde_json::json!({}));
    }
}
