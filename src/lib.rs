//! psqueelie - a small web console for ad-hoc SQL against PostgreSQL.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod chart;
pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod history;
pub mod logging;
pub mod persistence;
pub mod query;
pub mod server;
pub mod view;
