use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use service_core::auth::{Caller, TokenKind};
use service_core::error::AppError;

use crate::dtos::auth::{
    ChangePasswordRequest, PublicKeyResponse, RefreshRequest, RegisterRequest, TokenGrant,
    TokenObtainRequest, TokenObtainResponse,
};
use crate::models::{Account, SafeAccount};
use crate::utils::password::{hash_password, verify_dummy, verify_password, PASSWORD_ALGO};
use crate::AppState;

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SafeAccount>), AppError> {
    req.validate()?;

    let password_hash = hash_password(&req.password)?;
    let account = state
        .db
        .create_account(&req.username, &req.email, &password_hash, PASSWORD_ALGO)
        .await?;

    Ok((StatusCode::CREATED, Json(account.sanitized())))
}

/// POST /auth/token
///
/// First login step. Accounts with a confirmed second factor get a 2FA
/// challenge instead of tokens; everyone else gets the pair directly.
/// Password verification runs even for unknown usernames so timing does
/// not reveal which usernames exist.
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(req): Json<TokenObtainRequest>,
) -> Result<Json<TokenObtainResponse>, AppError> {
    let account = match state.db.find_account_by_username(&req.username).await? {
        Some(account) => account,
        None => {
            verify_dummy(&req.password);
            return Err(AppError::AuthInvalid(anyhow::anyhow!("invalid credentials")));
        }
    };

    verify_password(&req.password, &account.password_hash)?;
    require_active(&account)?;

    if state.two_factor.is_enabled(account.id).await? {
        tracing::info!(account_id = account.id, "Password accepted, second factor pending");
        return Ok(Json(TokenObtainResponse::TwoFactorChallenge {
            requires_2fa: true,
            username: account.username,
        }));
    }

    let pair = state.jwt.issue_pair(&account)?;
    tracing::info!(account_id = account.id, "Token pair issued");

    Ok(Json(TokenObtainResponse::Tokens(TokenGrant {
        pair,
        user: account.sanitized(),
        recovery_codes_remaining: None,
    })))
}

/// POST /auth/token/refresh
///
/// Verifies the refresh token (signature, kind, expiry) and that its
/// token-version still matches the account. Refresh tokens rotate: the
/// response carries a new refresh alongside the new access token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenGrant>, AppError> {
    let claims = state.verifier.verify(&req.refresh, TokenKind::Refresh).await?;

    let account = state
        .db
        .find_account_by_id(claims.subject_id()?)
        .await?
        .ok_or_else(|| AppError::AuthInvalid(anyhow::anyhow!("unknown account")))?;

    require_active(&account)?;

    if claims.ver != account.token_version {
        return Err(AppError::AuthInvalid(anyhow::anyhow!(
            "token has been revoked"
        )));
    }

    let pair = state.jwt.issue_pair(&account)?;
    Ok(Json(TokenGrant {
        pair,
        user: account.sanitized(),
        recovery_codes_remaining: None,
    }))
}

/// GET /auth/public-key
///
/// Publishes the verifying key so dependents can verify tokens locally.
/// Responses may be cached up to 24h; consumers refresh on unknown kid.
pub async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: state.key_material.public_pem.clone(),
        algorithm: service_core::auth::TOKEN_ALGORITHM,
        key_id: state.key_material.key_id.clone(),
    })
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Result<Json<SafeAccount>, AppError> {
    let account = load_account(&state, caller.subject).await?;
    Ok(Json(account.sanitized()))
}

/// POST /auth/password
///
/// Changing the password bumps the token-version counter, invalidating
/// every previously issued token for the account.
pub async fn change_password(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;

    let account = load_account(&state, caller.subject).await?;
    verify_password(&req.current_password, &account.password_hash)?;

    let new_hash = hash_password(&req.new_password)?;
    state.db.update_password(account.id, &new_hash).await?;

    tracing::info!(account_id = account.id, "Password changed, tokens revoked");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn load_account(state: &AppState, account_id: i64) -> Result<Account, AppError> {
    state
        .db
        .find_account_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("account not found")))
}

pub(crate) fn require_active(account: &Account) -> Result<(), AppError> {
    if !account.is_active {
        return Err(AppError::AuthInvalid(anyhow::anyhow!(
            "account is deactivated"
        )));
    }
    Ok(())
}
