//! gRPC infrastructure for inter-service calls.
//!
//! This module owns the resilient client side of the internal APIs:
//! - Error conversion between `AppError` and `tonic::Status`
//! - Retry with exponential backoff and jitter
//! - Per-target circuit breakers
//! - Identity and catalog clients composing breaker(retry(call))

pub mod breaker;
pub mod catalog_client;
pub mod error;
pub mod identity_client;
pub mod retry;

// Generated client-side proto code.
pub mod proto {
    pub mod identity {
        tonic::include_proto!("storefront.identity.v1");
    }
    pub mod catalog {
        tonic::include_proto!("storefront.catalog.v1");
    }
}

pub use breaker::CircuitBreaker;
pub use catalog_client::{Availability, CatalogClient, ProductInfo};
pub use error::{status_to_app_error, IntoStatus};
pub use identity_client::{IdentityClient, UserValidation};
pub use retry::{retry_rpc, RetryConfig};

use std::time::Duration;

/// Connection and resilience settings for one client target.
#[derive(Clone, Debug)]
pub struct RpcClientConfig {
    /// Target endpoint, e.g. "http://identity-service:50051".
    pub endpoint: String,
    /// Bearer credential attached to every call
    /// (`INTERNAL_RPC_SECRET`; replaced by mTLS identities in production).
    pub service_secret: String,
    /// Name the client reports in `requesting_service`.
    pub requesting_service: String,
    /// Per-call deadline.
    pub deadline: Duration,
    pub retry: RetryConfig,
    /// Consecutive failures before the breaker opens.
    pub breaker_threshold: u32,
    /// How long the breaker stays open before a half-open probe.
    pub breaker_reset: Duration,
}

/// Attach the bearer service credential to an outgoing request and arm
/// its deadline.
pub(crate) fn prepare_request<T>(
    request: &mut tonic::Request<T>,
    secret: &str,
    deadline: Duration,
) -> Result<(), tonic::Status> {
    let value = format!("Bearer {}", secret)
        .parse()
        .map_err(|_| tonic::Status::internal("service credential is not valid metadata"))?;
    request.metadata_mut().insert("authorization", value);
    request.set_timeout(deadline);
    Ok(())
}
