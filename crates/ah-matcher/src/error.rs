use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MatcherError {
    #[error("regex compilation failed: {0}")]
    RegexCompilationFailed(String),

    #[error("invalid alert: labels map must be present")]
    InvalidAlert,

    #[error("invalid silence: at least one matcher is required")]
    InvalidSilence,

    /// Carries the silence ids matched before cancellation was observed, so
    /// callers can't mistake this for a plain `Ok(vec![])`.
    #[error("context cancelled")]
    ContextCancelled(Vec<Uuid>),
}

pub type Result<T> = std::result::Result<T, MatcherError>;
