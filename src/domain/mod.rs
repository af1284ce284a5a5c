//! Domain layer for reqsmith
//!
//! This module contains core business logic, domain models and the port
//! traits external collaborators implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
