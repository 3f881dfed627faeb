use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error taxonomy shared by all storefront services.
///
/// Every variant maps to exactly one HTTP status and one stable
/// machine-readable discriminator, so clients branch on `code` instead of
/// parsing messages. Authentication variants carry deliberately coarse
/// messages to avoid account enumeration.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InputInvalid(anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Authorization credential missing")]
    AuthMissing,

    #[error("Invalid credentials")]
    AuthInvalid(anyhow::Error),

    #[error("Credential expired")]
    AuthExpired,

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Two-factor verification required")]
    TwoFactorRequired,

    #[error("Invalid two-factor code")]
    TwoFactorInvalid,

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflicting state: {0}")]
    ConflictState(anyhow::Error),

    #[error("Insufficient inventory for product {product_id}: {available} available")]
    InsufficientInventory { product_id: i64, available: i32 },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound(anyhow::anyhow!("row not found")),
            _ => AppError::DatabaseError(anyhow::Error::new(err)),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AppError::AuthExpired,
            _ => AppError::AuthInvalid(anyhow::Error::new(err)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl AppError {
    /// Stable machine-readable discriminator for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InputInvalid(_) | AppError::ValidationError(_) => "input_invalid",
            AppError::AuthMissing => "auth_missing",
            AppError::AuthInvalid(_) => "auth_invalid",
            AppError::AuthExpired => "auth_expired",
            AppError::Forbidden(_) => "forbidden",
            AppError::TwoFactorRequired => "two_factor_required",
            AppError::TwoFactorInvalid => "two_factor_invalid",
            AppError::NotFound(_) => "not_found",
            AppError::ConflictState(_) => "conflict_state",
            AppError::InsufficientInventory { .. } => "insufficient_inventory",
            AppError::DependencyUnavailable(_) => "dependency_unavailable",
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                "internal"
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InputInvalid(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthMissing
            | AppError::AuthInvalid(_)
            | AppError::AuthExpired
            | AppError::TwoFactorRequired
            | AppError::TwoFactorInvalid => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConflictState(_) => StatusCode::CONFLICT,
            AppError::InsufficientInventory { .. } => StatusCode::BAD_REQUEST,
            AppError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (error, details) = match &self {
            AppError::ValidationError(err) => {
                ("Validation failed".to_string(), Some(serde_json::json!(err.to_string())))
            }
            AppError::InsufficientInventory {
                product_id,
                available,
            } => (
                self.to_string(),
                Some(serde_json::json!({
                    "product_id": product_id,
                    "available": available,
                })),
            ),
            AppError::DatabaseError(err)
            | AppError::ConfigError(err)
            | AppError::InternalError(err) => {
                // Log the cause under a correlation id; the client only
                // sees the id.
                let correlation_id = Uuid::new_v4();
                tracing::error!(
                    correlation_id = %correlation_id,
                    error = %err,
                    "Internal error"
                );
                (
                    "Internal server error".to_string(),
                    Some(serde_json::json!({ "correlation_id": correlation_id })),
                )
            }
            other => (other.to_string(), None),
        };

        (
            status,
            Json(ErrorBody {
                code,
                error,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_are_stable() {
        assert_eq!(AppError::AuthMissing.code(), "auth_missing");
        assert_eq!(AppError::AuthExpired.code(), "auth_expired");
        assert_eq!(AppError::TwoFactorInvalid.code(), "two_factor_invalid");
        assert_eq!(
            AppError::InsufficientInventory {
                product_id: 1,
                available: 0
            }
            .code(),
            "insufficient_inventory"
        );
        assert_eq!(
            AppError::DependencyUnavailable("catalog".into()).code(),
            "dependency_unavailable"
        );
    }

    #[test]
    fn expired_jwt_maps_to_auth_expired() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AppError::from(err), AppError::AuthExpired));
    }

    #[test]
    fn invalid_jwt_maps_to_auth_invalid() {
        let err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        assert!(matches!(AppError::from(err), AppError::AuthInvalid(_)));
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(
            AppError::NotFound(anyhow::anyhow!("x")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DependencyUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::ConflictState(anyhow::anyhow!("x")).status(),
            StatusCode::CONFLICT
        );
    }
}
