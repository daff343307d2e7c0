//! # Infrastructure Layer
//!
//! Configuration loading and validation, logging bootstrap, and the wiring
//! that assembles providers and services into a running application
//! context. Pulling in `vcon-providers` here completes the linkme provider
//! registration for everything downstream.

/// Provider and service wiring
pub mod bootstrap;
/// Configuration types, loading and validation
pub mod config;
/// tracing-subscriber bootstrap
pub mod logging;

pub use bootstrap::AppContext;
pub use config::AppConfig;
