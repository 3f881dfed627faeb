//! Resilient client for the identity-service internal API.

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use super::proto::identity::user_service_client::UserServiceClient;
use super::proto::identity::ValidateUserRequest;
use super::{prepare_request, retry_rpc, status_to_app_error, CircuitBreaker, RpcClientConfig};
use crate::error::AppError;

/// In-process result of a `ValidateUser` call; deliberately distinct from
/// the wire type.
#[derive(Debug, Clone)]
pub struct UserValidation {
    pub valid: bool,
    pub user_id: i64,
    pub username: String,
    pub is_active: bool,
    pub error_message: String,
}

/// Identity-service client composing breaker(retry(call)): the breaker
/// sees one logical RPC per `validate_user`, however many physical
/// attempts the retry layer makes underneath.
#[derive(Clone)]
pub struct IdentityClient {
    client: UserServiceClient<Channel>,
    config: RpcClientConfig,
    breaker: Arc<CircuitBreaker>,
}

impl IdentityClient {
    /// Build the client. The channel connects lazily on first use so the
    /// retry and breaker layers own every failure mode, including the
    /// initial connect.
    pub fn new(config: RpcClientConfig) -> Result<Self, AppError> {
        let channel = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("invalid identity endpoint: {}", e))
            })?
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.deadline)
            .connect_lazy();

        let breaker = Arc::new(CircuitBreaker::new(
            "identity-service",
            config.breaker_threshold,
            config.breaker_reset,
        ));

        Ok(Self {
            client: UserServiceClient::new(channel),
            config,
            breaker,
        })
    }

    /// Validate that an account exists and is active.
    pub async fn validate_user(&self, account_id: i64) -> Result<UserValidation, AppError> {
        let response = self
            .breaker
            .call(|| {
                retry_rpc(&self.config.retry, "validate_user", || async move {
                    let mut client = self.client.clone();
                    let mut request = Request::new(ValidateUserRequest {
                        user_id: account_id,
                        requesting_service: self.config.requesting_service.clone(),
                    });
                    prepare_request(&mut request, &self.config.service_secret, self.config.deadline)?;
                    client.validate_user(request).await.map(|r| r.into_inner())
                })
            })
            .await
            .map_err(status_to_app_error)?;

        Ok(UserValidation {
            valid: response.valid,
            user_id: response.user_id,
            username: response.username,
            is_active: response.is_active,
            error_message: response.error_message,
        })
    }
}
