//! # Provider Layer
//!
//! Concrete adapters behind the domain ports: the PostgreSQL store with
//! pgvector search and the tag materialized view, Redis and Moka cache
//! providers, the fastembed embedding provider and the queue-draining
//! embedding worker. Cache and embedding providers self-register into the
//! domain registries via linkme.

/// Cache provider implementations
pub mod cache;
/// Database adapters
pub mod database;
/// Embedding provider and worker
pub mod embedding;
