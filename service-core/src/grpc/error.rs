//! Error conversion between `AppError` and `tonic::Status`.
//!
//! | AppError | gRPC Status |
//! |----------|-------------|
//! | `InputInvalid` / `ValidationError` | `INVALID_ARGUMENT` |
//! | `AuthMissing` / `AuthInvalid` / `AuthExpired` | `UNAUTHENTICATED` |
//! | `Forbidden` | `PERMISSION_DENIED` |
//! | `NotFound` | `NOT_FOUND` |
//! | `ConflictState` | `FAILED_PRECONDITION` |
//! | `InsufficientInventory` | `FAILED_PRECONDITION` |
//! | `DependencyUnavailable` | `UNAVAILABLE` |
//! | everything else | `INTERNAL` |

use tonic::{Code, Status};

use crate::error::AppError;

/// Extension trait for converting into `tonic::Status`.
pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl IntoStatus for AppError {
    fn into_status(self) -> Status {
        match self {
            AppError::InputInvalid(err) => Status::invalid_argument(err.to_string()),
            AppError::ValidationError(err) => {
                Status::invalid_argument(format!("validation error: {}", err))
            }
            AppError::AuthMissing => Status::unauthenticated("credential missing"),
            AppError::AuthInvalid(err) => Status::unauthenticated(err.to_string()),
            AppError::AuthExpired => Status::unauthenticated("credential expired"),
            AppError::Forbidden(err) => Status::permission_denied(err.to_string()),
            AppError::TwoFactorRequired => {
                Status::unauthenticated("two-factor verification required")
            }
            AppError::TwoFactorInvalid => Status::unauthenticated("invalid two-factor code"),
            AppError::NotFound(err) => Status::not_found(err.to_string()),
            AppError::ConflictState(err) => Status::failed_precondition(err.to_string()),
            AppError::InsufficientInventory {
                product_id,
                available,
            } => Status::failed_precondition(format!(
                "insufficient inventory for product {}: {} available",
                product_id, available
            )),
            AppError::DependencyUnavailable(msg) => Status::unavailable(msg),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                Status::internal("database error")
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                Status::internal("configuration error")
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal error");
                Status::internal("internal error")
            }
        }
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.into_status()
    }
}

/// Translate a final (post-retry, post-breaker) status into the
/// application taxonomy.
///
/// Unavailable-class codes become `DependencyUnavailable`; the resilient
/// client only surfaces them after retries are exhausted or the breaker
/// is open, so the translation never hides a transient failure behind a
/// logical error kind.
pub fn status_to_app_error(status: Status) -> AppError {
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted | Code::Unknown => {
            AppError::DependencyUnavailable(status.message().to_string())
        }
        Code::NotFound => AppError::NotFound(anyhow::anyhow!("{}", status.message())),
        Code::InvalidArgument => AppError::InputInvalid(anyhow::anyhow!("{}", status.message())),
        Code::Unauthenticated => AppError::AuthInvalid(anyhow::anyhow!("{}", status.message())),
        Code::PermissionDenied => AppError::Forbidden(anyhow::anyhow!("{}", status.message())),
        Code::FailedPrecondition => {
            AppError::ConflictState(anyhow::anyhow!("{}", status.message()))
        }
        _ => AppError::InternalError(anyhow::anyhow!(
            "rpc failed: {} ({})",
            status.message(),
            status.code()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_to_status() {
        let status: Status = AppError::NotFound(anyhow::anyhow!("product 999 not found")).into();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("999"));
    }

    #[test]
    fn unavailable_status_becomes_dependency_unavailable() {
        let err = status_to_app_error(Status::unavailable("catalog down"));
        assert!(matches!(err, AppError::DependencyUnavailable(_)));

        let err = status_to_app_error(Status::deadline_exceeded("timed out"));
        assert!(matches!(err, AppError::DependencyUnavailable(_)));
    }

    #[test]
    fn logical_statuses_keep_their_kind() {
        assert!(matches!(
            status_to_app_error(Status::not_found("missing")),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            status_to_app_error(Status::unauthenticated("bad secret")),
            AppError::AuthInvalid(_)
        ));
    }
}
