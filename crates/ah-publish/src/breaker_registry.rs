//! Per-unit circuit breaker registry (§4.G.4): one breaker per
//! `receiver.name + config_index`, generalized from the teacher's
//! `EndpointCircuitBreakerRegistry` keyed-map shape down to its
//! already-built single-instance breaker (`ah_pool::CircuitBreaker`)
//! wrapped per key, rather than reimplementing its own state machine.

use std::sync::Arc;

use dashmap::DashMap;

use ah_pool::{CircuitBreaker, CircuitBreakerConfig};

pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}

pub fn unit_key(receiver_name: &str, config_index: usize) -> String {
    format!("{receiver_name}:{config_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_pool::CircuitState;

    #[test]
    fn same_key_returns_same_breaker_instance() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        let a = registry.get_or_create("slack:0");
        a.record_failure();
        let b = registry.get_or_create("slack:0");
        assert_eq!(b.failure_count(), 1);
    }

    #[test]
    fn distinct_keys_are_isolated() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig {
            max_failures: 1,
            reset_timeout: std::time::Duration::from_secs(30),
        });
        let a = registry.get_or_create("slack:0");
        a.record_failure();
        assert_eq!(a.state(), CircuitState::Open);

        let b = registry.get_or_create("pagerduty:0");
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn unit_key_formats_receiver_and_index() {
        assert_eq!(unit_key("slack", 2), "slack:2");
    }
}
