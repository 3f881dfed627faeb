//! Trait seams over the resilient RPC clients so the orchestration
//! pipeline can be exercised without live dependencies.

use async_trait::async_trait;

use service_core::error::AppError;
use service_core::grpc::{Availability, CatalogClient, IdentityClient, ProductInfo, UserValidation};

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn validate_user(&self, account_id: i64) -> Result<UserValidation, AppError>;
}

#[async_trait]
pub trait CatalogGateway: Send + Sync {
    async fn get_product_info(&self, product_id: i64) -> Result<ProductInfo, AppError>;
    async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<Availability, AppError>;
}

#[async_trait]
impl IdentityGateway for IdentityClient {
    async fn validate_user(&self, account_id: i64) -> Result<UserValidation, AppError> {
        IdentityClient::validate_user(self, account_id).await
    }
}

#[async_trait]
impl CatalogGateway for CatalogClient {
    async fn get_product_info(&self, product_id: i64) -> Result<ProductInfo, AppError> {
        CatalogClient::get_product_info(self, product_id).await
    }

    async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<Availability, AppError> {
        CatalogClient::check_availability(self, product_id, quantity).await
    }
}
