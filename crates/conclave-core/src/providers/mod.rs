//! Provider execution layer
//!
//! - factory: builds vendor adapters from a [`ProviderSpec`](crate::credentials::ProviderSpec)
//! - executor: ordered, breaker-guarded, time-bounded attempts across a provider list

mod executor;
mod factory;

pub use executor::{ProviderExecutor, ProviderExecutorConfig};
pub use factory::{HttpProviderFactory, ProviderFactory, StaticProviderFactory};
