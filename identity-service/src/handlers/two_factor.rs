use axum::{extract::State, http::StatusCode, Json};

use service_core::auth::Caller;
use service_core::error::AppError;

use crate::dtos::auth::{
    DownloadCodesRequest, DownloadCodesResponse, PasswordConfirmRequest, RecoveryCodesResponse,
    TokenGrant, TwoFactorStatusResponse, VerifyLoginRequest, VerifySetupRequest,
};
use crate::handlers::auth::{load_account, require_active};
use crate::services::two_factor::{download_artifact, SetupResponse};
use crate::services::SecondStep;
use crate::AppState;

/// POST /auth/2fa/setup
pub async fn setup(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<SetupResponse>, AppError> {
    let account = load_account(&state, caller.subject).await?;
    let response = state.two_factor.begin_setup(&account).await?;
    Ok(Json(response))
}

/// POST /auth/2fa/verify-setup
pub async fn verify_setup(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<VerifySetupRequest>,
) -> Result<StatusCode, AppError> {
    let account = load_account(&state, caller.subject).await?;

    if let Some(device_ref) = &req.device_ref {
        tracing::debug!(account_id = account.id, device_ref, "Confirming 2FA device");
    }

    state.two_factor.confirm_setup(&account, &req.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/2fa/verify-login
///
/// Second login step; unauthenticated by design (the caller has no token
/// yet). Accepts a current TOTP value or an unused recovery code and only
/// then issues the token pair.
pub async fn verify_login(
    State(state): State<AppState>,
    Json(req): Json<VerifyLoginRequest>,
) -> Result<Json<TokenGrant>, AppError> {
    let account = match state.db.find_account_by_username(&req.username).await? {
        Some(account) => account,
        // Coarse kind on purpose: do not reveal whether the username exists.
        None => return Err(AppError::TwoFactorInvalid),
    };

    require_active(&account)?;

    let step = state.two_factor.verify_login(&account, &req.code).await?;
    let pair = state.jwt.issue_pair(&account)?;

    let recovery_codes_remaining = match step {
        SecondStep::Totp => None,
        SecondStep::RecoveryCode { remaining } => Some(remaining),
    };

    Ok(Json(TokenGrant {
        pair,
        user: account.sanitized(),
        recovery_codes_remaining,
    }))
}

/// GET /auth/2fa/status
pub async fn status(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<TwoFactorStatusResponse>, AppError> {
    let enabled = state.two_factor.is_enabled(caller.subject).await?;
    Ok(Json(TwoFactorStatusResponse { enabled }))
}

/// POST /auth/2fa/disable
pub async fn disable(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<PasswordConfirmRequest>,
) -> Result<StatusCode, AppError> {
    let account = load_account(&state, caller.subject).await?;
    state.two_factor.disable(&account, &req.password).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/2fa/recovery-codes/regenerate
pub async fn regenerate_codes(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<PasswordConfirmRequest>,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
    let account = load_account(&state, caller.subject).await?;
    let recovery_codes = state
        .two_factor
        .regenerate_codes(&account, &req.password)
        .await?;
    Ok(Json(RecoveryCodesResponse { recovery_codes }))
}

/// POST /auth/2fa/recovery-codes/download
///
/// Packages the codes the client was just shown into a downloadable
/// text artifact. Codes are never retrievable from storage.
pub async fn download_codes(
    Caller(caller): Caller,
    Json(req): Json<DownloadCodesRequest>,
) -> Result<Json<DownloadCodesResponse>, AppError> {
    if req.codes.is_empty() {
        return Err(AppError::InputInvalid(anyhow::anyhow!(
            "no codes provided"
        )));
    }

    let (filename, content_base64) = download_artifact(&caller.username, &req.codes);
    Ok(Json(DownloadCodesResponse {
        filename,
        content_type: "text/plain",
        content_base64,
    }))
}
