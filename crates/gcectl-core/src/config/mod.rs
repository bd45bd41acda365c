//! Profiles and orchestration settings
//!
//! A profile binds a project, a default zone, an API endpoint and an
//! optional access token to a name. Each profile may also carry its own
//! polling and retry table; anything it leaves out falls back to the
//! built-in defaults.

#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod orchestration;

pub use config::{Config, DEFAULT_ZONE, Profile};
pub use error::{ConfigError, Result};
pub use orchestration::{OrchestrationConfig, RetryConfig};
