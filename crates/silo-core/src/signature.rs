//! Deterministic extract signatures.
//!
//! A signature is the SHA-256 hex digest of the canonical JSON encoding of a
//! request's identity-relevant fields. Canonicalization sorts object keys and
//! list elements at every nesting level, so cosmetic reordering in a source
//! config never changes the signature and never defeats the cache.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of the truncated signature used in log lines.
const SHORT_LEN: usize = 12;

/// Recursively canonicalize a JSON value.
///
/// Objects are rebuilt with sorted keys; arrays are canonicalized
/// element-wise and then sorted by their compact encoding. Sorting applies at
/// every nesting level, so nested sub-lists (attached characteristics, case
/// selection values) are order-normalized too.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out: Vec<Value> = items.iter().map(canonicalize).collect();
            out.sort_by_key(|v| encode(v));
            Value::Array(out)
        }
        other => other.clone(),
    }
}

/// Compact encoding of a `Value`. Serializing a `Value` cannot fail (all
/// keys are strings), so this is total.
fn encode(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Compute the signature of an identity document: canonical encoding hashed
/// with SHA-256, lowercase hex. Pure and infallible.
pub fn digest(identity: &Value) -> String {
    let canonical = encode(&canonicalize(identity));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Truncated signature for log lines.
pub fn short(signature: &str) -> &str {
    &signature[..signature.len().min(SHORT_LEN)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Field order in the source document must not change the signature.
    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"samples": ["us2021a"], "collection": "usa"});
        let b = json!({"collection": "usa", "samples": ["us2021a"]});
        assert_eq!(digest(&a), digest(&b));
    }

    /// List order must not change the signature.
    #[test]
    fn list_order_is_irrelevant() {
        let a = json!({"samples": ["us2019a", "us2021a"]});
        let b = json!({"samples": ["us2021a", "us2019a"]});
        assert_eq!(digest(&a), digest(&b));
    }

    /// Sub-lists nested inside list elements are sorted too.
    #[test]
    fn nested_sublists_are_sorted() {
        let a = json!({"variables": [
            {"name": "EDUC", "attached_characteristics": ["mother", "father"]},
            {"name": "AGE"},
        ]});
        let b = json!({"variables": [
            {"name": "AGE"},
            {"name": "EDUC", "attached_characteristics": ["father", "mother"]},
        ]});
        assert_eq!(digest(&a), digest(&b));
    }

    /// Distinct identity-relevant content yields distinct signatures.
    #[test]
    fn identity_changes_change_the_signature() {
        let base = json!({"collection": "usa", "samples": ["us2021a"], "variables": ["AGE"]});
        let other_sample = json!({"collection": "usa", "samples": ["us2019a"], "variables": ["AGE"]});
        let other_variable = json!({"collection": "usa", "samples": ["us2021a"], "variables": ["SEX"]});
        let other_collection = json!({"collection": "nhis", "samples": ["us2021a"], "variables": ["AGE"]});

        let sigs = [
            digest(&base),
            digest(&other_sample),
            digest(&other_variable),
            digest(&other_collection),
        ];
        for (i, a) in sigs.iter().enumerate() {
            for b in &sigs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    /// Signatures are 64 lowercase hex characters.
    #[test]
    fn signature_shape() {
        let sig = digest(&json!({"collection": "usa"}));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn short_truncates() {
        let sig = digest(&json!({"collection": "usa"}));
        assert_eq!(short(&sig).len(), 12);
        assert!(sig.starts_with(short(&sig)));
    }
}
