// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

pub const CRATE_NAME: &str = "entrova-etl-core";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Validation = 3,
    DependencyFailure = 4,
    Internal = 10,
}

impl ExitCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Usage => "usage",
            Self::Validation => "validation",
            Self::DependencyFailure => "dependency_failure",
            Self::Internal => "internal",
        }
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub mod canonical {
    use serde::Serialize;
    use serde_json::{Map, Value};

    /// JSON bytes with object keys sorted at every depth, so equal values
    /// always serialize to equal bytes.
    pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
        let raw = serde_json::to_value(value)?;
        let normalized = normalize_json_value(raw);
        serde_json::to_vec(&normalized)
    }

    pub fn stable_json_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
        let bytes = stable_json_bytes(value)?;
        Ok(super::sha256_hex(&bytes))
    }

    fn normalize_json_value(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted = Map::new();
                let mut entries: Vec<(String, Value)> = map
                    .into_iter()
                    .map(|(k, v)| (k, normalize_json_value(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (k, v) in entries {
                    sorted.insert(k, v);
                }
                Value::Object(sorted)
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(normalize_json_value).collect())
            }
            other => other,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::{stable_json_bytes, stable_json_hash_hex};
        use serde_json::json;

        #[test]
        fn canonical_json_orders_object_keys() {
            let value = json!({
                "z": 1,
                "a": {"d": 4, "b": 2},
                "arr": [{"k2": 2, "k1": 1}],
            });

            let bytes = stable_json_bytes(&value).expect("stable json bytes");
            let text = String::from_utf8(bytes).expect("utf8 json");
            assert_eq!(text, r#"{"a":{"b":2,"d":4},"arr":[{"k1":1,"k2":2}],"z":1}"#);
        }

        #[test]
        fn canonical_hash_is_deterministic_for_same_value() {
            let value = json!({"b": 2, "a": 1});
            let h1 = stable_json_hash_hex(&value).expect("hash 1");
            let h2 = stable_json_hash_hex(&value).expect("hash 2");
            assert_eq!(h1, h2);
        }
    }
}
