//! Regex Cache (§4.C): bounded `pattern -> compiled` map, full-flush eviction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::{MatcherError, Result};

/// Thread-safe bounded cache of compiled regexes. Reads (`Get` hits) take a
/// shared lock; a miss takes the write lock to compile and insert. Identical
/// concurrent misses for the same pattern may each compile — only one
/// insert need win, so this races harmlessly on `HashMap::insert`.
pub struct RegexCache {
    max_size: usize,
    entries: RwLock<HashMap<String, Arc<Regex>>>,
}

impl RegexCache {
    pub fn new(max_size: usize) -> Self {
        Self { max_size: max_size.max(1), entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the compiled pattern, compiling and caching it on a miss.
    /// Compilation failure returns `ErrRegexCompilationFailed` without
    /// mutating the cache.
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(compiled) = self.entries.read().get(pattern) {
            return Ok(compiled.clone());
        }

        let compiled = Arc::new(
            Regex::new(pattern).map_err(|e| MatcherError::RegexCompilationFailed(e.to_string()))?,
        );

        let mut entries = self.entries.write();
        if entries.len() >= self.max_size && !entries.contains_key(pattern) {
            entries.clear();
        }
        entries.entry(pattern.to_string()).or_insert_with(|| compiled.clone());
        Ok(compiled)
    }

    pub fn size(&self) -> usize {
        self.entries.read().len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_caches_on_miss() {
        let cache = RegexCache::new(10);
        assert_eq!(cache.size(), 0);
        let first = cache.get("^foo.*$").unwrap();
        assert_eq!(cache.size(), 1);
        let second = cache.get("^foo.*$").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn invalid_pattern_does_not_mutate_cache() {
        let cache = RegexCache::new(10);
        assert!(cache.get("(unclosed").is_err());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn full_flush_eviction_on_miss_at_capacity() {
        let cache = RegexCache::new(2);
        cache.get("a").unwrap();
        cache.get("b").unwrap();
        assert_eq!(cache.size(), 2);
        cache.get("c").unwrap();
        assert_eq!(cache.size(), 1, "cache should flush fully before inserting the third pattern");
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = RegexCache::new(10);
        cache.get("a").unwrap();
        cache.clear();
        assert_eq!(cache.size(), 0);
    }
}
