//! Control-plane status codes and error responses.

use crate::db::DbError;
use crate::error::ServiceError;
use crate::platform::PlatformError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Status reported to control-plane callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    DeadlineExceeded,
    Cancelled,
    Internal,
    Unknown,
}

impl ApiStatus {
    /// Wire code used in error bodies.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::FailedPrecondition => "failed_precondition",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
            Self::Unknown => "unknown",
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            // Client closed request.
            Self::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            }
            Self::Internal | Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&ServiceError> for ApiStatus {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::NoBotTag(_) => Self::PermissionDenied,
            ServiceError::Db(DbError::NotFound(_)) => Self::NotFound,
            ServiceError::Db(DbError::Conflict(_)) => Self::AlreadyExists,
            ServiceError::Db(_) => Self::Internal,
            ServiceError::Platform(PlatformError::NotFound(_)) => Self::NotFound,
            ServiceError::InvalidArgument(_) => Self::InvalidArgument,
            ServiceError::FailedPrecondition(_) => Self::FailedPrecondition,
            ServiceError::DeadlineExceeded => Self::DeadlineExceeded,
            ServiceError::Cancelled => Self::Cancelled,
            ServiceError::Platform(_) => Self::Unknown,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

/// Error response: `{"code": "...", "message": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: ApiStatus,
    pub message: String,
}

impl ApiError {
    pub fn new(status: ApiStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ApiStatus::InvalidArgument, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::new(ApiStatus::from(&err), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.status.code(),
            message: &self.message,
        };
        (self.status.http_status(), Json(body)).into_response()
    }
}
