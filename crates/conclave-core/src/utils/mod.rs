//! Utility modules for conclave-core
//!
//! Provides common utilities:
//! - circuit_breaker: Circuit breaker pattern for fault tolerance
//! - ids: Job id generation

mod circuit_breaker;
mod ids;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitError, CircuitSnapshot,
    CircuitState,
};
pub use ids::new_job_id;
