//! Content fingerprints for change detection.
//!
//! A snapshot is serialized to canonical JSON (object keys sorted at every
//! depth, no insignificant whitespace) and hashed with SHA-256. Field order in
//! the registry response therefore never registers as a change.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use confwatch_core::ConfigSnapshot;

/// Hashed in place of JSON for [`ConfigSnapshot::Empty`]. A raw NUL never
/// appears in serialized JSON, so no payload can collide with it.
const EMPTY_SENTINEL: &[u8] = b"\0confwatch:empty-snapshot";

/// Lowercase hex SHA-256 digest of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn fingerprint(snapshot: &ConfigSnapshot) -> Fingerprint {
    let mut hasher = Sha256::new();
    match snapshot {
        ConfigSnapshot::Empty => hasher.update(EMPTY_SENTINEL),
        ConfigSnapshot::Value(value) => {
            let mut canonical = String::new();
            write_canonical(value, &mut canonical);
            hasher.update(canonical.as_bytes());
        }
    }
    Fingerprint(hex::encode(hasher.finalize()))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn fp(value: Value) -> Fingerprint {
        fingerprint(&ConfigSnapshot::Value(value))
    }

    #[test]
    fn same_value_same_digest() {
        let value = json!({"dataId": "D", "content": "k=v1"});
        assert_eq!(fp(value.clone()), fp(value));
    }

    #[test]
    fn key_order_is_irrelevant_at_every_depth() {
        let a: Value =
            serde_json::from_str(r#"{"a":1,"b":{"x":[1,{"p":true,"q":null}],"y":"s"}}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"b":{"y":"s","x":[1,{"q":null,"p":true}]},"a":1}"#).unwrap();
        assert_eq!(fp(a), fp(b));
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(fp(json!([1, 2])), fp(json!([2, 1])));
    }

    #[rstest]
    #[case::null(json!(null))]
    #[case::empty_string(json!(""))]
    #[case::empty_object(json!({}))]
    #[case::empty_array(json!([]))]
    #[case::sentinel_text(json!("\u{0}confwatch:empty-snapshot"))]
    fn empty_snapshot_is_distinct(#[case] value: Value) {
        assert_ne!(fingerprint(&ConfigSnapshot::Empty), fp(value));
    }

    #[test]
    fn empty_snapshot_is_stable() {
        assert_eq!(
            fingerprint(&ConfigSnapshot::Empty),
            fingerprint(&ConfigSnapshot::Empty)
        );
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        let digest = fp(json!({"content": "k=v1"}));
        assert_eq!(digest.as_str().len(), 64);
        assert!(digest
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn content_change_changes_digest() {
        assert_ne!(fp(json!({"content": "k=v1"})), fp(json!({"content": "k=v2"})));
    }
}
