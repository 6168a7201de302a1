//! Integration tests for psqueelie.

pub mod api_test;
pub mod connection_test;
pub mod persistence_test;
pub mod query_test;
