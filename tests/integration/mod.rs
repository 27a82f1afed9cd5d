//! Integration tests for text2data.

pub mod connection_test;
pub mod http_stub;
pub mod pipeline_test;
pub mod remote_test;
