//! Unit test suite for the infrastructure crate.

mod config_tests;
