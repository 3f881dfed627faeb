use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::{AuthenticatedCaller, TokenVerifier};
use crate::error::AppError;

/// Middleware that requires a valid access token on every request.
///
/// On success the [`AuthenticatedCaller`] is stored in request extensions
/// for the [`Caller`] / [`AdminCaller`] extractors.
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::AuthMissing)?;

    let caller = verifier.verify_access(token).await?;

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Extractor handing the verified caller to handlers.
pub struct Caller(pub AuthenticatedCaller);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = parts
            .extensions
            .get::<AuthenticatedCaller>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "caller missing from request extensions; is require_auth installed?"
                ))
            })?;
        Ok(Caller(caller))
    }
}

/// Extractor that additionally requires the admin claim.
pub struct AdminCaller(pub AuthenticatedCaller);

impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Caller(caller) = Caller::from_request_parts(parts, state).await?;
        if !caller.is_admin {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "administrator access required"
            )));
        }
        Ok(AdminCaller(caller))
    }
}
