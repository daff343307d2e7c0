//! Cache provider implementations.
//!
//! | Provider | Type | Description |
//! |----------|------|-------------|
//! | [`MokaCacheProvider`] | Local | In-process cache for single instances |
//! | [`RedisCacheProvider`] | Distributed | Redis-backed for multi-instance deployments |
//!
//! Both register themselves into the domain cache registry; configuration
//! picks one by name. The store never depends on either being available.

pub mod moka;
pub mod redis;

pub use moka::MokaCacheProvider;
pub use redis::RedisCacheProvider;
