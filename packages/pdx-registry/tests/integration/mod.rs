//! Integration test suite.
//!
//! 1. Remote/local schema round-trips through the public registry API
//! 2. Preserved-field expiry on the real background scheduler
//! 3. Concurrent registration and lookup

pub mod concurrency_tests;
pub mod expiry_tests;
pub mod helpers;
pub mod round_trip_tests;
