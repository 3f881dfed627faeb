//! Shared infrastructure for storefront services.
//!
//! Provides the pieces every service needs but none should own twice:
//! - The error taxonomy (`AppError`) with HTTP and gRPC renderings
//! - Environment-based configuration helpers
//! - Structured logging initialization
//! - The token-verification library (key acquisition, kid cache, RS256
//!   verification, axum middleware)
//! - Resilient gRPC clients for identity-service and catalog-service
//!   (retry with exponential backoff wrapped in a circuit breaker)

pub mod auth;
pub mod config;
pub mod error;
pub mod grpc;
pub mod observability;

pub use error::AppError;
