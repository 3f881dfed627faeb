use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use super::keys::KeyStore;
use super::{AuthenticatedCaller, Claims, TokenKind};
use crate::error::AppError;

/// Local verifier for identity-service tokens.
///
/// The algorithm is pinned to RS256: tokens claiming `none`, any HMAC
/// family, or any other algorithm are rejected before signature
/// processing. Expiry is enforced to the second (no leeway).
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyStore>,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// Verify an access token and produce the caller capability.
    /// Resource endpoints accept only `kind == access`.
    pub async fn verify_access(&self, token: &str) -> Result<AuthenticatedCaller, AppError> {
        let claims = self.verify(token, TokenKind::Access).await?;
        Ok(AuthenticatedCaller {
            subject: claims.subject_id()?,
            username: claims.username,
            is_admin: claims.admin,
            expires_at: claims.exp,
        })
    }

    /// Verify a token of the expected kind and return its claims.
    pub async fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, AppError> {
        let header = decode_header(token)?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::AuthInvalid(anyhow::anyhow!(
                "token algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::AuthInvalid(anyhow::anyhow!("token carries no key id")))?;

        let key = self.keys.get(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = decode::<Claims>(token, &key, &validation)?;
        let claims = data.claims;

        let now = Utc::now().timestamp();
        if claims.iat > now {
            return Err(AppError::AuthInvalid(anyhow::anyhow!(
                "token issued in the future"
            )));
        }

        if claims.kind != expected_kind {
            return Err(AppError::AuthInvalid(anyhow::anyhow!(
                "wrong token kind for this operation"
            )));
        }

        Ok(claims)
    }
}
