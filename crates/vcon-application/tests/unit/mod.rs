//! Unit test suite for the application crate.
//!
//! Services are exercised against in-memory port implementations so the
//! tests validate orchestration (hook order, cache invalidation, enqueue
//! behavior), not SQL.

mod support;

mod plugin_tests;
mod tag_service_tests;
mod vcon_service_tests;
