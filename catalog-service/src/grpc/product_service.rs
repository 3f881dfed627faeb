//! gRPC implementation of the internal ProductService.

use tonic::{Request, Response, Status};

use service_core::grpc::IntoStatus;

use super::proto::product_service_server::ProductService;
use super::proto::{
    AvailabilityRequest, AvailabilityResponse, ProductInfoRequest, ProductInfoResponse,
};
use crate::AppState;

pub struct ProductServiceImpl {
    state: AppState,
}

impl ProductServiceImpl {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl ProductService for ProductServiceImpl {
    async fn get_product_info(
        &self,
        request: Request<ProductInfoRequest>,
    ) -> Result<Response<ProductInfoResponse>, Status> {
        super::check_service_auth(
            request.metadata(),
            &self.state.config.internal_rpc_secret,
        )?;

        let req = request.into_inner();
        tracing::info!(
            product_id = req.product_id,
            requesting_service = %req.requesting_service,
            "GetProductInfo called"
        );

        let product = self
            .state
            .db
            .find_product(req.product_id)
            .await
            .map_err(|e| e.into_status())?;

        let response = match product {
            Some(product) => ProductInfoResponse {
                found: true,
                id: product.id,
                name: product.name,
                description: product.description,
                // Decimal rides the wire as a string; floats would lose
                // precision.
                price: product.price.to_string(),
                inventory_count: product.inventory_count,
                is_active: product.is_active,
                error_message: String::new(),
            },
            None => ProductInfoResponse {
                found: false,
                id: req.product_id,
                name: String::new(),
                description: String::new(),
                price: String::new(),
                inventory_count: 0,
                is_active: false,
                error_message: format!("product {} not found", req.product_id),
            },
        };

        Ok(Response::new(response))
    }

    async fn check_availability(
        &self,
        request: Request<AvailabilityRequest>,
    ) -> Result<Response<AvailabilityResponse>, Status> {
        super::check_service_auth(
            request.metadata(),
            &self.state.config.internal_rpc_secret,
        )?;

        let req = request.into_inner();
        tracing::info!(
            product_id = req.product_id,
            quantity = req.quantity,
            requesting_service = %req.requesting_service,
            "CheckAvailability called"
        );

        let product = self
            .state
            .db
            .find_product(req.product_id)
            .await
            .map_err(|e| e.into_status())?;

        let response = match product {
            Some(product) => {
                let available = product.can_supply(req.quantity);
                AvailabilityResponse {
                    available,
                    current_inventory: product.inventory_count,
                    error_message: if available {
                        String::new()
                    } else {
                        format!(
                            "insufficient inventory: available {}, requested {}",
                            product.inventory_count, req.quantity
                        )
                    },
                }
            }
            None => AvailabilityResponse {
                available: false,
                current_inventory: 0,
                error_message: format!("product {} not found", req.product_id),
            },
        };

        Ok(Response::new(response))
    }
}
