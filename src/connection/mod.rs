//! Connection checks for psqueelie.
//!
//! Confirms the configured database is reachable before queries are offered.

pub mod probe;

pub use probe::{ConnectionProbe, ProbeReport};
