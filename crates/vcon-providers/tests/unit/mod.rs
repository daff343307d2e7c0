//! Unit test suite for the provider crate.

mod cache_tests;
mod worker_tests;
