use actix_web::{error, http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;

use crate::core::TransitionError;
use crate::models::ErrorResponse;
use crate::services::PostgresError;

/// Service-level error taxonomy rendered as the JSON error body
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Transient storage failure; the caller may retry
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unavailable(_) => "service_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Internal details stay in the logs
        let message = match self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message,
            status_code: status.as_u16(),
        })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => {
                tracing::warn!("Database unavailable: {}", err);
                AppError::Unavailable("Database is temporarily unavailable".to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    AppError::Conflict(format!("Duplicate record: {}", db_err.message()))
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    AppError::NotFound("Referenced record does not exist".to_string())
                }
                sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation => {
                    AppError::Validation(db_err.message().to_string())
                }
                _ => {
                    tracing::error!("Database error: {}", err);
                    AppError::Internal(err.to_string())
                }
            },
            _ => {
                tracing::error!("Database error: {}", err);
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<PostgresError> for AppError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::SqlxError(e) => e.into(),
            PostgresError::MigrateError(e) => {
                tracing::error!("Migration error: {}", e);
                AppError::Internal(e.to_string())
            }
            PostgresError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            PostgresError::InvalidInput(msg) => AppError::Validation(msg),
            PostgresError::Conflict(msg) => AppError::Conflict(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    AppError::Validation(format!("Invalid JSON: {}", err)).into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query error on {}: {}", req.path(), err);
    AppError::Validation(format!("Invalid query: {}", err)).into()
}

/// Handle malformed path segments such as non-UUID ids
pub fn handle_path_error(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Path error on {}: {}", req.path(), err);
    AppError::Validation(format!("Invalid path: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DonationStatus, RequestStatus};

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Unavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sqlx_classification() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
        assert!(matches!(AppError::from(sqlx::Error::PoolTimedOut), AppError::Unavailable(_)));
        assert!(matches!(AppError::from(sqlx::Error::PoolClosed), AppError::Unavailable(_)));
        assert!(matches!(
            AppError::from(sqlx::Error::Protocol("bad frame".into())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_storage_errors_map_to_taxonomy() {
        let err: AppError = PostgresError::NotFound("Donation 42".into()).into();
        assert_eq!(err.to_string(), "Donation 42 not found");

        let err: AppError = PostgresError::InvalidInput("bad code".into()).into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = TransitionError::DonationClosed(DonationStatus::Expired).into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = TransitionError::InvalidRequestTransition {
            from: RequestStatus::Rejected,
            to: RequestStatus::Approved,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let response = AppError::Internal("connection string leaked".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes =
            tokio_test::block_on(actix_web::body::to_bytes(response.into_body())).unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "internal_error");
        assert_eq!(body.message, "Internal server error");
        assert_eq!(body.status_code, 500);
    }
}
