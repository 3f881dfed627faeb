//! gRPC server side of the catalog internal API.

pub mod product_service;

pub mod proto {
    tonic::include_proto!("storefront.catalog.v1");
}

pub use product_service::ProductServiceImpl;

use tonic::{metadata::MetadataMap, Status};

/// Enforce the shared-secret bearer credential on internal calls.
pub(crate) fn check_service_auth(metadata: &MetadataMap, secret: &str) -> Result<(), Status> {
    let presented = metadata
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Status::unauthenticated("missing service credentials"))?;

    if presented != format!("Bearer {}", secret) {
        return Err(Status::unauthenticated("invalid service credentials"));
    }
    Ok(())
}
