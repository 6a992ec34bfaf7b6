//! Content fingerprints for result-cache keys.
//!
//! Sort, group and pipeline results are memoized per dataset. Keying on the
//! dataset length alone lets two different datasets of equal size share a
//! cache slot, so keys carry a digest of the content instead.

use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Blake3 digest over a canonical encoding of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(data: &[Value]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(data.len() as u64).to_le_bytes());
        for item in data {
            hash_value(&mut hasher, item);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}

// Each variant is tagged and length-prefixed so that distinct trees never
// produce the same byte stream. Object fields are fed in sorted order.
fn hash_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Null => {
            hasher.update(&[0]);
        }
        Value::Bool(b) => {
            hasher.update(&[1, *b as u8]);
        }
        Value::Number(n) => {
            hasher.update(&[2]);
            hash_str(hasher, &n.to_string());
        }
        Value::String(s) => {
            hasher.update(&[3]);
            hash_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(&[4]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update(&[5]);
            hasher.update(&(map.len() as u64).to_le_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hash_str(hasher, key);
                hash_value(hasher, &map[key.as_str()]);
            }
        }
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
