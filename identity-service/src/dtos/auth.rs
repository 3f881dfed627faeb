use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::SafeAccount;
use crate::services::TokenPair;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenObtainRequest {
    pub username: String,
    pub password: String,
}

/// Outcome of the first login step: either a full token pair, or a
/// challenge telling the client to complete the second factor. No tokens
/// are issued on the challenge path.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TokenObtainResponse {
    Tokens(TokenGrant),
    TwoFactorChallenge { requires_2fa: bool, username: String },
}

#[derive(Debug, Serialize)]
pub struct TokenGrant {
    #[serde(flatten)]
    pub pair: TokenPair,
    pub user: SafeAccount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_codes_remaining: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
    pub algorithm: &'static str,
    pub key_id: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyLoginRequest {
    pub username: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifySetupRequest {
    pub code: String,
    /// Optional client-side label for the authenticator device.
    #[serde(default)]
    pub device_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordConfirmRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorStatusResponse {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RecoveryCodesResponse {
    pub recovery_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadCodesRequest {
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadCodesResponse {
    pub filename: String,
    pub content_type: &'static str,
    pub content_base64: String,
}
