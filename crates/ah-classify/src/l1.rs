//! L1: in-process, concurrent-safe fingerprint -> classification map.

use dashmap::DashMap;

use ah_common::Classification;

pub struct L1Cache {
    entries: DashMap<String, Classification>,
}

impl L1Cache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn get(&self, fingerprint: &str) -> Option<Classification> {
        self.entries.get(fingerprint).map(|e| e.clone())
    }

    pub fn put(&self, classification: Classification) {
        self.entries.insert(classification.fingerprint.clone(), classification);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for L1Cache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_common::{ClassificationSource, Severity};
    use chrono::Utc;

    fn sample(fingerprint: &str) -> Classification {
        Classification {
            fingerprint: fingerprint.to_string(),
            severity: Severity::Warning,
            confidence: 0.6,
            reasoning: "test".to_string(),
            recommendations: vec![],
            processing_time_seconds: 0.0,
            source: ClassificationSource::Cache,
            model: None,
            model_version: None,
            cache_hit: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = L1Cache::new();
        assert!(cache.get("fp").is_none());
        cache.put(sample("fp"));
        assert_eq!(cache.get("fp").unwrap().severity, Severity::Warning);
        assert_eq!(cache.len(), 1);
    }
}
