//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//!
//! Database and HTTP adapters live under `crate::adapters`.

pub mod config;
pub mod logging;
