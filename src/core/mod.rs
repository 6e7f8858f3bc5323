//! Core module - shared infrastructure for Conclave
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, RetryScope, RoleConfig};
pub use error::{ConclaveError, Result};
pub use types::*;
