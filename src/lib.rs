//! text2data - bridge a caller's database identity to a conversational
//! analytics service.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
pub mod remote;
pub mod safety;
pub mod secrets;
pub mod tool;
