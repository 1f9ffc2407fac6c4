//! Shared domain types for the alert-history core:
//! - Alert / Classification (§3, §4.B, §4.E)
//! - Silence / Matcher (§3, §4.D)
//! - Receiver / dispatch configs (§3, §4.F, §4.G)
//! - PublishingAttempt (§3, §4.G)
//! - RetryPolicy, shared by the Pool Façade and Publishing Fanout (§4.A, §4.G)
//! - fingerprint computation (§4.H.1)
//! - logging initialization

pub mod alert;
pub mod fingerprint;
pub mod logging;
pub mod publishing;
pub mod receiver;
pub mod retry;
pub mod silence;

pub use alert::{Alert, AlertStatus, Classification, ClassificationSource, Severity};
pub use fingerprint::fingerprint;
pub use publishing::{AttemptStatus, PublishingAttempt};
pub use receiver::{
    ChatConfig, DispatchConfig, EmailConfig, HttpConfigOptions, IncidentConfig, Receiver,
    TargetType, TlsConfig, WebhookConfig,
};
pub use retry::{RetryPolicy, TransientErrorKind};
pub use silence::{Matcher, MatcherType, Silence, SilenceStatus};
