//! # Application Layer
//!
//! Use-case services orchestrating the domain ports: vCon lifecycle with
//! cache and hook interleaving, the four search modes, the tag subsystem,
//! and the plugin manager. Everything here talks to traits from
//! `vcon-domain`; concrete providers are injected at bootstrap.

/// Plugin manager: hook pipelines and plugin tool dispatch
pub mod plugins;
/// Jittered-backoff retry for retryable storage errors
pub mod retry;
/// Use-case services
pub mod use_cases;

pub use plugins::PluginManager;
pub use use_cases::{SearchPayload, SearchService, TagService, VconService};
