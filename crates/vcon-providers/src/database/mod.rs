//! Database adapters.

/// PostgreSQL implementation of the store, search, tag, queue and tenant
/// ports
pub mod postgres;
