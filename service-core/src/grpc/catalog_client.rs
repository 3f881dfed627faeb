//! Resilient client for the catalog-service internal API.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use super::proto::catalog::product_service_client::ProductServiceClient;
use super::proto::catalog::{AvailabilityRequest, ProductInfoRequest};
use super::{prepare_request, retry_rpc, status_to_app_error, CircuitBreaker, RpcClientConfig};
use crate::error::AppError;

/// In-process product snapshot. `price` is parsed from the wire string
/// into a fixed-point decimal before any arithmetic sees it.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub found: bool,
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub inventory_count: i32,
    pub is_active: bool,
    pub error_message: String,
}

#[derive(Debug, Clone)]
pub struct Availability {
    pub available: bool,
    pub current_inventory: i32,
    pub error_message: String,
}

/// Catalog-service client composing breaker(retry(call)); one breaker is
/// shared by both operations since they target the same dependency.
#[derive(Clone)]
pub struct CatalogClient {
    client: ProductServiceClient<Channel>,
    config: RpcClientConfig,
    breaker: Arc<CircuitBreaker>,
}

impl CatalogClient {
    pub fn new(config: RpcClientConfig) -> Result<Self, AppError> {
        let channel = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("invalid catalog endpoint: {}", e)))?
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.deadline)
            .connect_lazy();

        let breaker = Arc::new(CircuitBreaker::new(
            "catalog-service",
            config.breaker_threshold,
            config.breaker_reset,
        ));

        Ok(Self {
            client: ProductServiceClient::new(channel),
            config,
            breaker,
        })
    }

    /// Fetch a product's name, price and inventory snapshot.
    pub async fn get_product_info(&self, product_id: i64) -> Result<ProductInfo, AppError> {
        let response = self
            .breaker
            .call(|| {
                retry_rpc(&self.config.retry, "get_product_info", || async move {
                    let mut client = self.client.clone();
                    let mut request = Request::new(ProductInfoRequest {
                        product_id,
                        requesting_service: self.config.requesting_service.clone(),
                    });
                    prepare_request(&mut request, &self.config.service_secret, self.config.deadline)?;
                    client
                        .get_product_info(request)
                        .await
                        .map(|r| r.into_inner())
                })
            })
            .await
            .map_err(status_to_app_error)?;

        let price = if response.found {
            response.price.parse::<Decimal>().map_err(|e| {
                AppError::InternalError(anyhow::anyhow!(
                    "catalog returned unparseable price {:?} for product {}: {}",
                    response.price,
                    product_id,
                    e
                ))
            })?
        } else {
            Decimal::ZERO
        };

        Ok(ProductInfo {
            found: response.found,
            id: response.id,
            name: response.name,
            description: response.description,
            price,
            inventory_count: response.inventory_count,
            is_active: response.is_active,
            error_message: response.error_message,
        })
    }

    /// Ask whether `quantity` units are currently available. Never
    /// decrements inventory.
    pub async fn check_availability(
        &self,
        product_id: i64,
        quantity: i32,
    ) -> Result<Availability, AppError> {
        let response = self
            .breaker
            .call(|| {
                retry_rpc(&self.config.retry, "check_availability", || async move {
                    let mut client = self.client.clone();
                    let mut request = Request::new(AvailabilityRequest {
                        product_id,
                        quantity,
                        requesting_service: self.config.requesting_service.clone(),
                    });
                    prepare_request(&mut request, &self.config.service_secret, self.config.deadline)?;
                    client
                        .check_availability(request)
                        .await
                        .map(|r| r.into_inner())
                })
            })
            .await
            .map_err(status_to_app_error)?;

        Ok(Availability {
            available: response.available,
            current_inventory: response.current_inventory,
            error_message: response.error_message,
        })
    }
}
