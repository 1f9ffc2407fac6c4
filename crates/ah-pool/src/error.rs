use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("circuit breaker open")]
    CircuitBreakerOpen,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("operation timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, PoolError>;
