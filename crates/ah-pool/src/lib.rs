pub mod circuit_breaker;
pub mod error;
pub mod health;
pub mod pool;
pub mod retry_executor;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{PoolError, Result};
pub use health::{PingFn, PingFuture, PoolHealthChecker};
pub use pool::{AlertPool, ConnectionState, PoolConfig, PoolConfigRequest, PoolStats};
