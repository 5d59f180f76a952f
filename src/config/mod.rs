//! Configuration module for the vidfetch service.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument merging
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{Config, DownloadsConfig, ServerConfig};
pub use validation::validate_config;
