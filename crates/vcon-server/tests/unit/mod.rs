//! Unit test suite for the server crate.

mod requests_tests;
