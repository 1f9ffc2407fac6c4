//! Publishing Fanout (§4.G): parallel bounded dispatch to receiver targets,
//! per-unit retry/backoff and circuit breaker, payload encoding, SSRF guard,
//! and audit logging through the Alert Store.

mod breaker_registry;
mod dispatch;
mod error;
mod payload;
mod publisher;
mod report;
mod signing;
mod ssrf_guard;

pub use breaker_registry::{unit_key, BreakerRegistry};
pub use error::{PublishError, Result};
pub use publisher::{Publisher, PublisherConfig};
pub use report::{PublishReport, ReportStatus, UnitOutcome, UnitResult};
