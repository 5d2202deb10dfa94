//! Application wiring for the `conclave` binary
//!
//! - `config`: configuration structures, one per `config/default.toml` section
//! - `loader`: layered loading from embedded defaults, files and environment
//! - `init`: builds the shared services and hands out orchestrators and runners

pub mod config;
mod init;
mod loader;

pub use init::App;
pub use loader::load_config;
