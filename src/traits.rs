//! Seams between the pipeline and its external collaborators
//!
//! The pipeline never talks to the network or to a credential store
//! directly. It goes through these traits so that tests and embedders can
//! swap in their own implementations.

use crate::net::{HttpRequest, HttpResponse};
use crate::Result;
use async_trait::async_trait;

/// Minimal asynchronous HTTP transport.
///
/// Implementations resolve to `Ok` for any completed exchange, whatever its
/// status code, and to `Err(LoopError::Network)` when no response arrived.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Builds the authentication headers for valid-times requests.
pub trait CredentialProvider: Send + Sync {
    /// Fails with `MissingCredentials` when nothing usable is configured
    fn validate(&self) -> Result<()>;

    /// Adds the provider's headers to an outgoing request
    fn authorize(&self, request: HttpRequest) -> HttpRequest;
}
