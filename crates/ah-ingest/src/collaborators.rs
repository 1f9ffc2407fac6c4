//! Seams for the two collaborators the orchestrator consumes but does not
//! own (§1 Non-goals: the routing config parser; §3: silences are "owned by
//! an external admin subsystem"). `routeFor` and the active-silence set are
//! both named in the spec as external functions; these traits are the
//! injection points, with a pair of simple default implementations suitable
//! for a single-process deployment until a real admin subsystem exists.

use std::sync::RwLock;

use ah_common::{Alert, Silence};
use async_trait::async_trait;

/// Supplies the active silence set the orchestrator evaluates against each
/// alert (§4.H step 4). Owned and mutated by whatever admin surface manages
/// silences; the orchestrator only reads a snapshot per ingest.
#[async_trait]
pub trait SilenceSource: Send + Sync {
    async fn active_silences(&self) -> Vec<Silence>;
}

/// In-process silence set, refreshed wholesale by `set`. A stand-in for the
/// external admin subsystem referenced in §3; production deployments that
/// grow a silence-CRUD surface would replace this with one backed by the
/// Alert Store's Postgres pool instead.
pub struct InMemorySilenceSource {
    silences: RwLock<Vec<Silence>>,
}

impl InMemorySilenceSource {
    pub fn new(silences: Vec<Silence>) -> Self {
        Self { silences: RwLock::new(silences) }
    }

    pub fn set(&self, silences: Vec<Silence>) {
        *self.silences.write().expect("silence lock poisoned") = silences;
    }
}

impl Default for InMemorySilenceSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl SilenceSource for InMemorySilenceSource {
    async fn active_silences(&self) -> Vec<Silence> {
        let now = chrono::Utc::now();
        self.silences.read().expect("silence lock poisoned").iter().filter(|s| s.is_active(now)).cloned().collect()
    }
}

/// Resolves the receiver names an alert should fan out to (§4.H step 5's
/// `routeFor`). The validated routing tree itself is explicitly out of
/// scope (§1): this trait is where a host process plugs in whatever
/// resolves that tree (label-based rule matching, a static map, …).
pub trait RouteResolver: Send + Sync {
    fn route_for(&self, alert: &Alert) -> Vec<String>;
}

/// Routes every alert to every receiver currently in the Target Registry.
/// The simplest possible `routeFor`, useful for single-tenant deployments
/// or local development where there is no routing tree to speak of.
pub struct AllReceiversRouter {
    registry: std::sync::Arc<ah_targets::TargetRegistry>,
}

impl AllReceiversRouter {
    pub fn new(registry: std::sync::Arc<ah_targets::TargetRegistry>) -> Self {
        Self { registry }
    }
}

impl RouteResolver for AllReceiversRouter {
    fn route_for(&self, _alert: &Alert) -> Vec<String> {
        self.registry.list().iter().map(|r| r.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_common::{Matcher, MatcherType};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn silence(starts: chrono::DateTime<Utc>, ends: chrono::DateTime<Utc>) -> Silence {
        Silence {
            id: Uuid::new_v4(),
            created_by: "oncall".to_string(),
            comment: "window".to_string(),
            starts_at: starts,
            ends_at: ends,
            matchers: vec![Matcher {
                name: "alertname".to_string(),
                value: "HighCPU".to_string(),
                matcher_type: MatcherType::Eq,
            }],
        }
    }

    #[tokio::test]
    async fn active_silences_excludes_expired_and_pending() {
        let now = Utc::now();
        let source = InMemorySilenceSource::new(vec![
            silence(now - Duration::hours(2), now - Duration::hours(1)),
            silence(now - Duration::minutes(5), now + Duration::minutes(5)),
            silence(now + Duration::hours(1), now + Duration::hours(2)),
        ]);
        let active = source.active_silences().await;
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn set_replaces_the_whole_snapshot() {
        let source = InMemorySilenceSource::default();
        assert!(source.active_silences().await.is_empty());
        let now = Utc::now();
        source.set(vec![silence(now - Duration::minutes(1), now + Duration::minutes(1))]);
        assert_eq!(source.active_silences().await.len(), 1);
    }
}
