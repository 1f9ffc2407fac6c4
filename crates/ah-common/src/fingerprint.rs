//! Fingerprint computation (§4.H.1): a stable 64-hex identifier derived from
//! the canonicalized label set of an alert.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// SHA-256 hex over the sorted `name\x00value\x00…` canonicalization of
/// labels. `BTreeMap` already iterates in sorted key order, so callers
/// holding labels in a `BTreeMap<String, String>` get canonical ordering for
/// free.
pub fn fingerprint(labels: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in labels {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_regardless_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("alertname".to_string(), "HighCPU".to_string());
        a.insert("severity".to_string(), "critical".to_string());

        let mut b = BTreeMap::new();
        b.insert("severity".to_string(), "critical".to_string());
        b.insert("alertname".to_string(), "HighCPU".to_string());

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn fingerprint_differs_for_different_labels() {
        let mut a = BTreeMap::new();
        a.insert("alertname".to_string(), "HighCPU".to_string());
        let mut b = BTreeMap::new();
        b.insert("alertname".to_string(), "LowMemory".to_string());
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
