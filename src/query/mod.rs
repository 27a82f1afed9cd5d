//! Query execution.
//!
//! Runs a validated statement over one exclusively owned connection and
//! reduces the result to the single identity attribute the remote service
//! needs.

pub mod executor;

pub use executor::{extract_user_property, QueryExecutor};
