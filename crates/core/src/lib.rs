//! Fincrm core types and utilities
//!
//! Configuration, state directory resolution and tracing setup shared by the
//! HTTP client layer and the command line host.

pub mod config;
pub mod error;
pub mod state_dir;
pub mod tracing;

pub use config::{
    ClientConfig, MAX_REFRESH_TOKEN_TTL_DAYS, Service, ServiceEndpoints, SessionConfig,
};
pub use error::{CoreError, CoreResult};
pub use state_dir::StateDir;
