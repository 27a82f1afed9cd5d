//! Remote analytics service.
//!
//! Verifies the access token and forwards a natural-language query together
//! with the caller's identity attribute, mapping the answer onto ordered
//! text, structured, and status messages.

pub mod client;
pub mod mock;
pub mod types;

pub use client::{HttpRemoteClient, RemoteConfig, DEFAULT_REQUEST_TIMEOUT};
pub use mock::MockRemoteService;
pub use types::{interpret_query, interpret_verify, RemoteQueryRequest, ToolMessage};

use async_trait::async_trait;

use crate::error::Result;

/// Trait for remote analytics services.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Checks the configured access token. Any failure is a credential error.
    async fn verify(&self) -> Result<()>;

    /// Runs a query and returns its messages in emission order.
    async fn query(&self, request: &RemoteQueryRequest) -> Result<Vec<ToolMessage>>;
}
