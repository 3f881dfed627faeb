//! gRPC server side of the identity internal API.

pub mod user_service;

pub mod proto {
    tonic::include_proto!("storefront.identity.v1");
}

pub use user_service::UserServiceImpl;

use tonic::{metadata::MetadataMap, Status};

/// Enforce the shared-secret bearer credential on internal calls.
/// Development transport only; production replaces this with mTLS.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_bearer_secret() {
        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(check_service_auth(&metadata, "s3cret").is_ok());
    }

    #[test]
    fn rejects_missing_or_wrong_credentials() {
        let metadata = MetadataMap::new();
        assert!(check_service_auth(&metadata, "s3cret").is_err());

        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", "Bearer wrong".parse().unwrap());
        assert!(check_service_auth(&metadata, "s3cret").is_err());
    }
}
