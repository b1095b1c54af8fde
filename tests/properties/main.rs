//! Property-based test suite entry point.

mod determinism_tests;
