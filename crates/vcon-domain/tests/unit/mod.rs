//! Unit test suite for the domain crate.

mod embedding_tests;
mod serde_tests;
mod validation_tests;
