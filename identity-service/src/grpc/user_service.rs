//! gRPC implementation of the internal UserService.

use tonic::{Request, Response, Status};

use service_core::grpc::IntoStatus;

use super::proto::user_service_server::UserService;
use super::proto::{ValidateUserRequest, ValidateUserResponse};
use crate::AppState;

pub struct UserServiceImpl {
    state: AppState,
}

impl UserServiceImpl {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl UserService for UserServiceImpl {
    async fn validate_user(
        &self,
        request: Request<ValidateUserRequest>,
    ) -> Result<Response<ValidateUserResponse>, Status> {
        super::check_service_auth(
            request.metadata(),
            &self.state.config.internal_rpc_secret,
        )?;

        let req = request.into_inner();
        tracing::info!(
            user_id = req.user_id,
            requesting_service = %req.requesting_service,
            "ValidateUser called"
        );

        let account = self
            .state
            .db
            .find_account_by_id(req.user_id)
            .await
            .map_err(|e| e.into_status())?;

        let response = match account {
            Some(account) if account.is_active => ValidateUserResponse {
                valid: true,
                user_id: account.id,
                username: account.username,
                is_active: true,
                error_message: String::new(),
            },
            Some(account) => ValidateUserResponse {
                valid: false,
                user_id: account.id,
                username: account.username,
                is_active: false,
                error_message: format!("account {} is deactivated", req.user_id),
            },
            None => ValidateUserResponse {
                valid: false,
                user_id: req.user_id,
                username: String::new(),
                is_active: false,
                error_message: format!("account {} not found", req.user_id),
            },
        };

        Ok(Response::new(response))
    }
}
