//! Target Registry (§4.F): read-only at run time, hot-reloaded by atomic
//! swap of the entire registry reference — generalized from the teacher's
//! periodic-rebuild-and-replace config sync (`fc-router/src/config_sync.rs`)
//! from an `RwLock`-guarded struct to a true lock-free `ArcSwap`, since reads
//! here (one per publish fanout) vastly outnumber reloads.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use ah_common::Receiver;

use crate::error::{Result, TargetsError};

fn validate(receivers: &[Receiver]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for r in receivers {
        if !r.has_valid_name() {
            return Err(TargetsError::InvalidName(r.name.clone()));
        }
        if !r.is_non_empty() {
            return Err(TargetsError::Empty(r.name.clone()));
        }
        if !seen.insert(r.name.clone()) {
            return Err(TargetsError::Duplicate(r.name.clone()));
        }
    }
    Ok(())
}

fn to_map(receivers: Vec<Receiver>) -> HashMap<String, Arc<Receiver>> {
    receivers.into_iter().map(|r| (r.name.clone(), Arc::new(r))).collect()
}

pub struct TargetRegistry {
    receivers: ArcSwap<HashMap<String, Arc<Receiver>>>,
}

impl TargetRegistry {
    pub fn new(receivers: Vec<Receiver>) -> Result<Self> {
        validate(&receivers)?;
        Ok(Self { receivers: ArcSwap::from_pointee(to_map(receivers)) })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Receiver>> {
        self.receivers.load().get(name).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Receiver>> {
        self.receivers.load().values().cloned().collect()
    }

    /// Atomically replaces the whole registry. In-flight reads that already
    /// loaded the old map keep working against it until they drop it.
    pub fn reload(&self, receivers: Vec<Receiver>) -> Result<()> {
        validate(&receivers)?;
        let count = receivers.len();
        self.receivers.store(Arc::new(to_map(receivers)));
        info!(receiver_count = count, "target registry reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_common::{DispatchConfig, HttpConfigOptions};

    fn webhook_receiver(name: &str) -> Receiver {
        Receiver {
            name: name.to_string(),
            webhook_configs: vec![DispatchConfig {
                url: "https://example.com/hook".to_string(),
                method: "POST".to_string(),
                headers: Default::default(),
                send_resolved: true,
                max_alerts: 0,
                http_config: HttpConfigOptions::default(),
            }],
            chat_configs: vec![],
            incident_configs: vec![],
            email_configs: vec![],
        }
    }

    #[test]
    fn get_and_list_reflect_construction() {
        let registry = TargetRegistry::new(vec![webhook_receiver("slack")]).unwrap();
        assert!(registry.get("slack").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = TargetRegistry::new(vec![webhook_receiver("slack"), webhook_receiver("slack")]).unwrap_err();
        assert!(matches!(err, TargetsError::Duplicate(_)));
    }

    #[test]
    fn rejects_empty_receiver() {
        let empty = Receiver { name: "empty".to_string(), ..Default::default() };
        let err = TargetRegistry::new(vec![empty]).unwrap_err();
        assert!(matches!(err, TargetsError::Empty(_)));
    }

    #[test]
    fn reload_atomically_replaces_registry() {
        let registry = TargetRegistry::new(vec![webhook_receiver("slack")]).unwrap();
        registry.reload(vec![webhook_receiver("pagerduty")]).unwrap();
        assert!(registry.get("slack").is_none());
        assert!(registry.get("pagerduty").is_some());
    }

    #[test]
    fn reload_rejects_invalid_set_and_keeps_old_registry() {
        let registry = TargetRegistry::new(vec![webhook_receiver("slack")]).unwrap();
        let bad = Receiver { name: "bad name!".to_string(), ..webhook_receiver("x") };
        assert!(registry.reload(vec![bad]).is_err());
        assert!(registry.get("slack").is_some(), "failed reload must not mutate the live registry");
    }
}
