//! Query execution for psqueelie.
//!
//! This module isolates running one SQL batch and capturing its result from
//! the HTTP and CLI front ends.

pub mod executor;
mod result;

pub use executor::QueryExecutor;
pub use result::QueryResult;
